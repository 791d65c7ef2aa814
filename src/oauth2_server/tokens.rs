// ABOUTME: Opaque token lifecycle for access tokens, refresh tokens and auth codes
// ABOUTME: Mints CSPRNG base64url values with fixed TTLs and validates them against the store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Token service. Every secret is raw CSPRNG bytes encoded base64url without
//! padding; nothing is derivable from a token value. Expired access tokens
//! are deleted when observed during validation.

use crate::errors::{AppError, AppResult};
use crate::models::{AccessToken, AuthorizationCode, RefreshToken};
use crate::store::{AuthStore, Store};
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Access token length in random bytes before encoding
pub const ACCESS_TOKEN_LENGTH: usize = 32;
/// Refresh token length in random bytes before encoding
pub const REFRESH_TOKEN_LENGTH: usize = 32;
/// Authorization code length in random bytes before encoding
pub const AUTH_CODE_LENGTH: usize = 32;
/// Client id length in random bytes before encoding
pub const CLIENT_ID_LENGTH: usize = 16;
/// Client secret length in random bytes before encoding
pub const CLIENT_SECRET_LENGTH: usize = 32;
/// Pending authorization request id length in random bytes before encoding
pub const PENDING_REQUEST_ID_LENGTH: usize = 16;
/// Local user id length in random bytes before encoding
pub const USER_ID_LENGTH: usize = 16;

/// Access token lifetime
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
/// Refresh token lifetime
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;
/// Authorization code lifetime
pub const AUTH_CODE_TTL_SECS: i64 = 600;
/// Pending authorization request lifetime
pub const PENDING_REQUEST_TTL_SECS: i64 = 600;

/// Mints and validates opaque secrets
#[derive(Clone)]
pub struct TokenService {
    store: Arc<Store>,
}

impl TokenService {
    /// Create a token service over the given store
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Generate a CSPRNG value of `num_bytes` random bytes, base64url encoded
    /// without padding
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails
    pub fn generate_secure_token(num_bytes: usize) -> Result<String> {
        let rng = SystemRandom::new();
        let mut bytes = vec![0u8; num_bytes];
        rng.fill(&mut bytes)
            .map_err(|_| anyhow!("system RNG failure"))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Mint and persist a one-time authorization code
    ///
    /// # Errors
    ///
    /// Returns an error if token generation or persistence fails
    #[allow(clippy::too_many_arguments)]
    pub async fn mint_auth_code(
        &self,
        client_id: &str,
        user_id: &str,
        redirect_uri: &str,
        scope: &str,
        code_challenge: &str,
        code_challenge_method: &str,
        resource: Option<String>,
    ) -> Result<AuthorizationCode> {
        let now = Utc::now();
        let code = AuthorizationCode {
            code: Self::generate_secure_token(AUTH_CODE_LENGTH)?,
            client_id: client_id.to_owned(),
            redirect_uri: redirect_uri.to_owned(),
            scope: scope.to_owned(),
            code_challenge: code_challenge.to_owned(),
            code_challenge_method: code_challenge_method.to_owned(),
            resource,
            user_id: user_id.to_owned(),
            expires_at: now + Duration::seconds(AUTH_CODE_TTL_SECS),
            created_at: now,
        };
        self.store.store_auth_code(&code).await?;
        Ok(code)
    }

    /// Issue and persist a fresh access/refresh token pair
    ///
    /// # Errors
    ///
    /// Returns an error if token generation or persistence fails
    pub async fn issue_token_pair(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &str,
        resource: Option<String>,
    ) -> Result<(AccessToken, RefreshToken)> {
        let now = Utc::now();
        let access = AccessToken {
            token: Self::generate_secure_token(ACCESS_TOKEN_LENGTH)?,
            token_type: "Bearer".to_owned(),
            client_id: client_id.to_owned(),
            user_id: user_id.to_owned(),
            scope: scope.to_owned(),
            resource: resource.clone(),
            expires_at: now + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            created_at: now,
        };
        let refresh = RefreshToken {
            token: Self::generate_secure_token(REFRESH_TOKEN_LENGTH)?,
            client_id: client_id.to_owned(),
            user_id: user_id.to_owned(),
            scope: scope.to_owned(),
            resource,
            expires_at: now + Duration::seconds(REFRESH_TOKEN_TTL_SECS),
            created_at: now,
        };

        self.store.store_access_token(&access).await?;
        self.store.store_refresh_token(&refresh).await?;
        Ok((access, refresh))
    }

    /// Validate a bearer access token value.
    ///
    /// Distinguishes unknown tokens (`AuthInvalid`) from expired ones
    /// (`AuthExpired`); expired tokens are deleted on observation.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` for unknown tokens, `AuthExpired` for expired
    /// ones, and `StorageError` for backend failures
    pub async fn validate_access_token(&self, token: &str) -> AppResult<AccessToken> {
        let record = self
            .store
            .get_access_token(token)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?
            .ok_or_else(|| AppError::auth_invalid("access token not found"))?;

        if record.is_expired() {
            if let Err(e) = self.store.delete_access_token(token).await {
                tracing::warn!("failed to delete expired access token: {e}");
            }
            return Err(AppError::auth_expired());
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::errors::ErrorCode;

    fn temp_store() -> (tempfile::TempDir, Arc<Store>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().to_str().unwrap()).unwrap();
        (dir, Arc::new(store))
    }

    #[test]
    fn secure_tokens_are_base64url_and_unique() {
        let a = TokenService::generate_secure_token(32).unwrap();
        let b = TokenService::generate_secure_token(32).unwrap();
        // 32 bytes encode to 43 characters without padding
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(!a.contains('='));
    }

    #[tokio::test]
    async fn issued_pair_validates_until_expiry() {
        let (_dir, store) = temp_store();
        let service = TokenService::new(Arc::clone(&store));

        let (access, refresh) = service
            .issue_token_pair("u1", "c1", "mcp:tools", None)
            .await
            .unwrap();
        assert_eq!(access.token_type, "Bearer");
        assert!(store
            .get_refresh_token(&refresh.token)
            .await
            .unwrap()
            .is_some());

        let validated = service.validate_access_token(&access.token).await.unwrap();
        assert_eq!(validated.user_id, "u1");
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_not_expired() {
        let (_dir, store) = temp_store();
        let service = TokenService::new(store);
        let err = service.validate_access_token("nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[tokio::test]
    async fn expired_token_is_deleted_on_validation() {
        let (_dir, store) = temp_store();
        let service = TokenService::new(Arc::clone(&store));

        let mut access = AccessToken {
            token: "stale".to_owned(),
            token_type: "Bearer".to_owned(),
            client_id: "c1".to_owned(),
            user_id: "u1".to_owned(),
            scope: String::new(),
            resource: None,
            expires_at: Utc::now() - Duration::seconds(5),
            created_at: Utc::now() - Duration::seconds(3600),
        };
        store.store_access_token(&access).await.unwrap();

        let err = service.validate_access_token("stale").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthExpired);
        assert!(store.get_access_token("stale").await.unwrap().is_none());

        // A fresh expiry validates again
        access.expires_at = Utc::now() + Duration::seconds(60);
        store.store_access_token(&access).await.unwrap();
        assert!(service.validate_access_token("stale").await.is_ok());
    }
}
