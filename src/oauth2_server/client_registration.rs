// ABOUTME: OAuth 2.0 dynamic client registration implementation (RFC 7591)
// ABOUTME: Validates redirect URIs, mints client credentials and stores hashed secrets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

use super::models::{ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error};
use super::tokens::{TokenService, CLIENT_ID_LENGTH, CLIENT_SECRET_LENGTH};
use crate::config::StaticClientConfig;
use crate::models::RegisteredClient;
use crate::store::{AuthStore, Store};
use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Out-of-band redirect URN for native apps (RFC 8252)
const OOB_REDIRECT_URN: &str = "urn:ietf:wg:oauth:2.0:oob";

/// OAuth 2.0 Client Registration Manager
#[derive(Clone)]
pub struct ClientRegistrationManager {
    store: Arc<Store>,
}

impl ClientRegistrationManager {
    /// Creates a new client registration manager
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Register a new OAuth 2.0 client (RFC 7591)
    ///
    /// # Errors
    ///
    /// Returns an error if registration validation fails or the store write
    /// fails
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        Self::validate_registration_request(&request)?;

        let client_id = Self::generate_client_id()?;
        let client_secret = Self::generate_client_secret()?;

        let grant_types = request.grant_types.unwrap_or_else(|| {
            vec!["authorization_code".to_owned(), "refresh_token".to_owned()]
        });
        let response_types = request
            .response_types
            .unwrap_or_else(|| vec!["code".to_owned()]);
        let created_at = Utc::now();

        let client = RegisteredClient {
            client_id: client_id.clone(),
            client_secret_hash: Some(hash_client_secret(&client_secret)),
            client_name: request
                .client_name
                .clone()
                .unwrap_or_else(|| "Unnamed client".to_owned()),
            client_uri: request.client_uri.clone(),
            redirect_uris: request.redirect_uris.clone(),
            grant_types: grant_types.clone(),
            response_types: response_types.clone(),
            token_endpoint_auth_method: "client_secret_post".to_owned(),
            is_static: false,
            created_at,
        };

        self.store.store_client(&client).await.map_err(|e| {
            tracing::error!(error = %e, client_id = %client_id, "Failed to store client registration");
            OAuth2Error::server_error("failed to store client registration")
        })?;

        tracing::info!(client_id = %client_id, "Registered OAuth client");

        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
            client_id_issued_at: created_at.timestamp(),
            client_secret_expires_at: 0,
            redirect_uris: request.redirect_uris,
            grant_types,
            response_types,
            token_endpoint_auth_method: "client_secret_post".to_owned(),
            client_name: request.client_name,
            client_uri: request.client_uri,
            scope: request.scope,
        })
    }

    /// Create a static client with generated credentials (admin endpoint)
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the store write fails
    pub async fn create_static_client(
        &self,
        client_name: &str,
        redirect_uris: Vec<String>,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        if client_name.is_empty() {
            return Err(OAuth2Error::invalid_request("client_name is required"));
        }
        if redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "at least one redirect_uri is required",
            ));
        }
        for uri in &redirect_uris {
            if !Self::is_valid_redirect_uri(uri) {
                return Err(OAuth2Error::invalid_request(&format!(
                    "invalid redirect_uri: {uri}"
                )));
            }
        }

        let client_id = Self::generate_client_id()?;
        let client_secret = Self::generate_client_secret()?;
        let created_at = Utc::now();

        let client = RegisteredClient {
            client_id: client_id.clone(),
            client_secret_hash: Some(hash_client_secret(&client_secret)),
            client_name: client_name.to_owned(),
            client_uri: None,
            redirect_uris: redirect_uris.clone(),
            grant_types: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
            response_types: vec!["code".to_owned()],
            token_endpoint_auth_method: "client_secret_post".to_owned(),
            is_static: true,
            created_at,
        };
        self.store
            .store_client(&client)
            .await
            .map_err(|_| OAuth2Error::server_error("failed to store client"))?;

        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
            client_id_issued_at: created_at.timestamp(),
            client_secret_expires_at: 0,
            redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            client_name: Some(client_name.to_owned()),
            client_uri: None,
            scope: None,
        })
    }

    /// Seed a static client from configuration. Existing records under the
    /// same id are overwritten so config stays authoritative across restarts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails
    pub async fn seed_static_client(&self, config: &StaticClientConfig) -> Result<()> {
        let client = RegisteredClient {
            client_id: config.client_id.clone(),
            client_secret_hash: Some(hash_client_secret(&config.client_secret)),
            client_name: config.client_name.clone(),
            client_uri: None,
            redirect_uris: config.redirect_uris.clone(),
            grant_types: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
            response_types: vec!["code".to_owned()],
            token_endpoint_auth_method: "client_secret_post".to_owned(),
            is_static: true,
            created_at: Utc::now(),
        };
        self.store.store_client(&client).await?;
        tracing::info!(client_id = %config.client_id, "Seeded static OAuth client");
        Ok(())
    }

    /// Validate registration request
    fn validate_registration_request(
        request: &ClientRegistrationRequest,
    ) -> Result<(), OAuth2Error> {
        if request.redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "at least one redirect_uri is required",
            ));
        }
        for uri in &request.redirect_uris {
            if !Self::is_valid_redirect_uri(uri) {
                return Err(OAuth2Error::invalid_request(&format!(
                    "invalid redirect_uri: {uri}"
                )));
            }
        }
        if let Some(ref grant_types) = request.grant_types {
            for grant_type in grant_types {
                if !matches!(grant_type.as_str(), "authorization_code" | "refresh_token") {
                    return Err(OAuth2Error::invalid_request(&format!(
                        "unsupported grant_type: {grant_type}"
                    )));
                }
            }
        }
        if let Some(ref response_types) = request.response_types {
            for response_type in response_types {
                if response_type != "code" {
                    return Err(OAuth2Error::invalid_request(&format!(
                        "unsupported response_type: {response_type}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check if a redirect URI is acceptable (RFC 6749 section 3.1.2.2)
    fn is_valid_redirect_uri(uri: &str) -> bool {
        if uri.trim().is_empty() {
            return false;
        }
        // Fragments and wildcards are rejected outright
        if uri.contains('#') || uri.contains('*') {
            tracing::warn!("Rejected redirect_uri: {}", uri);
            return false;
        }
        if uri == OOB_REDIRECT_URN {
            return true;
        }
        Self::validate_http_uri(uri)
    }

    /// https always; http only for loopback hosts
    fn validate_http_uri(uri: &str) -> bool {
        let Ok(parsed) = url::Url::parse(uri) else {
            tracing::warn!("Rejected malformed redirect_uri: {}", uri);
            return false;
        };
        let is_loopback =
            parsed.host_str() == Some("localhost") || parsed.host_str() == Some("127.0.0.1");
        match parsed.scheme() {
            "https" => true,
            "http" if is_loopback => true,
            _ => {
                tracing::warn!("Rejected redirect_uri with disallowed scheme: {}", uri);
                false
            }
        }
    }

    fn generate_client_id() -> Result<String, OAuth2Error> {
        let token = TokenService::generate_secure_token(CLIENT_ID_LENGTH)
            .map_err(|_| OAuth2Error::server_error("system RNG failure"))?;
        Ok(format!("mcp_{token}"))
    }

    fn generate_client_secret() -> Result<String, OAuth2Error> {
        TokenService::generate_secure_token(CLIENT_SECRET_LENGTH)
            .map_err(|_| OAuth2Error::server_error("system RNG failure"))
    }
}

/// Hash a client secret for storage: lowercase hex SHA-256 digest
#[must_use]
pub fn hash_client_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Constant-time comparison of a plaintext secret against a stored digest
#[must_use]
pub fn verify_client_secret(secret: &str, stored_hash: &str) -> bool {
    let computed = hash_client_secret(secret);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn redirect_uri_rules() {
        let valid = [
            "https://app.example.com/callback",
            "http://localhost:3000/cb",
            "http://127.0.0.1/cb",
            "urn:ietf:wg:oauth:2.0:oob",
        ];
        for uri in valid {
            assert!(ClientRegistrationManager::is_valid_redirect_uri(uri), "{uri}");
        }

        let invalid = [
            "",
            "http://app.example.com/callback",
            "https://app.example.com/cb#fragment",
            "https://*.example.com/cb",
            "not a url",
        ];
        for uri in invalid {
            assert!(!ClientRegistrationManager::is_valid_redirect_uri(uri), "{uri}");
        }
    }

    #[test]
    fn secret_hash_verifies_and_rejects() {
        let hash = hash_client_secret("s3cret");
        assert_eq!(hash.len(), 64);
        assert!(verify_client_secret("s3cret", &hash));
        assert!(!verify_client_secret("other", &hash));
    }

    #[tokio::test]
    async fn register_requires_redirect_uris() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().to_str().unwrap()).unwrap());
        let manager = ClientRegistrationManager::new(store);

        let err = manager
            .register_client(ClientRegistrationRequest {
                redirect_uris: vec![],
                client_name: None,
                client_uri: None,
                grant_types: None,
                response_types: None,
                scope: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_request");
    }

    #[tokio::test]
    async fn register_stores_hash_never_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().to_str().unwrap()).unwrap());
        let manager = ClientRegistrationManager::new(Arc::clone(&store));

        let response = manager
            .register_client(ClientRegistrationRequest {
                redirect_uris: vec!["http://localhost/cb".to_owned()],
                client_name: Some("Test".to_owned()),
                client_uri: None,
                grant_types: None,
                response_types: None,
                scope: None,
            })
            .await
            .unwrap();

        assert!(response.client_id.starts_with("mcp_"));
        let stored = store.get_client(&response.client_id).await.unwrap().unwrap();
        let hash = stored.client_secret_hash.unwrap();
        assert_ne!(hash, response.client_secret);
        assert!(verify_client_secret(&response.client_secret, &hash));
    }
}
