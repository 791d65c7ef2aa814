// ABOUTME: PKCE (RFC 7636) code challenge and verifier validation
// ABOUTME: Enforces S256 by default with constant-time challenge comparison
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! PKCE validation. The server requires PKCE on every authorization request;
//! an empty challenge method defaults to `S256`.

use super::models::OAuth2Error;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use subtle::ConstantTimeEq;

/// S256 challenges are the base64url encoding of a 32-byte digest
const S256_CHALLENGE_LENGTH: usize = 43;

static VERIFIER_RE: OnceLock<Regex> = OnceLock::new();

fn verifier_regex() -> &'static Regex {
    VERIFIER_RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time literal
        Regex::new(r"^[A-Za-z0-9\-._~]{43,128}$").unwrap()
    })
}

fn is_base64url(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Validate a code challenge as presented on the authorization request
///
/// # Errors
///
/// Returns `invalid_request` if the challenge is missing, malformed for the
/// method, or the method is unsupported
pub fn validate_code_challenge(challenge: &str, method: &str) -> Result<(), OAuth2Error> {
    if challenge.is_empty() {
        return Err(OAuth2Error::invalid_request(
            "code_challenge is required (PKCE is mandatory)",
        ));
    }

    match method {
        // Empty method defaults to S256
        "" | "S256" => {
            if challenge.len() != S256_CHALLENGE_LENGTH || !is_base64url(challenge) {
                return Err(OAuth2Error::invalid_request(
                    "code_challenge must be 43 base64url characters for S256",
                ));
            }
            Ok(())
        }
        "plain" => {
            if !verifier_regex().is_match(challenge) {
                return Err(OAuth2Error::invalid_request(
                    "code_challenge must be 43-128 characters from the verifier alphabet",
                ));
            }
            Ok(())
        }
        other => Err(OAuth2Error::invalid_request(&format!(
            "unsupported code_challenge_method: {other}"
        ))),
    }
}

/// Verify a code verifier against the challenge bound to the grant
///
/// # Errors
///
/// Returns `invalid_grant` if the verifier is malformed, the method is
/// unsupported, or the verifier does not match the challenge
pub fn validate_pkce(verifier: &str, challenge: &str, method: &str) -> Result<(), OAuth2Error> {
    if !verifier_regex().is_match(verifier) {
        return Err(OAuth2Error::invalid_grant(
            "code_verifier must be 43-128 characters from the verifier alphabet",
        ));
    }

    let matches = match method {
        "" | "S256" => {
            let digest = Sha256::digest(verifier.as_bytes());
            let computed = URL_SAFE_NO_PAD.encode(digest);
            computed.as_bytes().ct_eq(challenge.as_bytes()).into()
        }
        "plain" => verifier.as_bytes().ct_eq(challenge.as_bytes()).into(),
        other => {
            return Err(OAuth2Error::invalid_grant(&format!(
                "unsupported code_challenge_method: {other}"
            )))
        }
    };

    if matches {
        Ok(())
    } else {
        Err(OAuth2Error::invalid_grant("PKCE verification failed"))
    }
}

/// Compute the S256 challenge for a verifier (used by tests and tooling)
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    // Test vector from RFC 7636 appendix B
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn s256_round_trip() {
        assert_eq!(s256_challenge(VERIFIER), CHALLENGE);
        validate_code_challenge(CHALLENGE, "S256").unwrap();
        validate_pkce(VERIFIER, CHALLENGE, "S256").unwrap();
    }

    #[test]
    fn empty_method_defaults_to_s256() {
        validate_code_challenge(CHALLENGE, "").unwrap();
        validate_pkce(VERIFIER, CHALLENGE, "").unwrap();
    }

    #[test]
    fn mutated_verifier_fails() {
        let mutated = format!("X{}", &VERIFIER[1..]);
        let err = validate_pkce(&mutated, CHALLENGE, "S256").unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[test]
    fn plain_method_compares_bytes() {
        let verifier = "a".repeat(43);
        validate_pkce(&verifier, &verifier, "plain").unwrap();
        assert!(validate_pkce(&verifier, &"b".repeat(43), "plain").is_err());
    }

    #[test]
    fn verifier_length_bounds_enforced() {
        assert!(validate_pkce(&"a".repeat(42), CHALLENGE, "S256").is_err());
        assert!(validate_pkce(&"a".repeat(129), CHALLENGE, "S256").is_err());
        // Characters outside the alphabet are rejected
        assert!(validate_pkce(&format!("{}!", "a".repeat(43)), CHALLENGE, "S256").is_err());
    }

    #[test]
    fn challenge_shape_enforced() {
        assert!(validate_code_challenge("", "S256").is_err());
        assert!(validate_code_challenge("too-short", "S256").is_err());
        assert!(validate_code_challenge(&"a".repeat(44), "S256").is_err());
        assert!(validate_code_challenge(&"a".repeat(43), "plain").is_ok());
        assert!(validate_code_challenge(CHALLENGE, "S512").is_err());
    }
}
