// ABOUTME: Store factory and backend abstraction for runtime backend selection
// ABOUTME: Detects the backend from the database URL and delegates trait calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Store factory for creating storage backends from a database URL.
//!
//! `sled:<path>` (or a bare filesystem path) selects the embedded sled
//! backend. SQL URLs are recognized but rejected until a SQL backend lands.

use super::sled_backend::SledStore;
use super::AuthStore;
use crate::models::{
    AccessToken, AuthSession, AuthorizationCode, PendingAuthRequest, RefreshToken,
    RegisteredClient, User,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, info};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// Embedded sled key-value store
    Sled,
}

/// Store instance wrapper that delegates to the selected backend
#[derive(Clone)]
pub enum Store {
    /// Embedded sled backend
    Sled(SledStore),
}

impl Store {
    /// Create a store from a database URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL names an unsupported backend or the
    /// backend fails to open
    pub fn new(database_url: &str) -> Result<Self> {
        debug!("Detecting store backend from URL: {}", database_url);
        let store_type = detect_store_type(database_url)?;
        match store_type {
            StoreType::Sled => {
                let path = database_url.strip_prefix("sled:").unwrap_or(database_url);
                let store = SledStore::new(path)?;
                info!("Sled store opened at {}", path);
                Ok(Self::Sled(store))
            }
        }
    }

    /// Get a descriptive string for the current backend
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::Sled(_) => "sled (embedded key-value)",
        }
    }
}

/// Detect the storage backend from a database URL
///
/// # Errors
///
/// Returns an error for SQL URLs (no SQL backend is wired up yet) and for
/// empty URLs
pub fn detect_store_type(database_url: &str) -> Result<StoreType> {
    if database_url.is_empty() {
        return Err(anyhow!("database URL must not be empty"));
    }
    if database_url.starts_with("sqlite:") || database_url.starts_with("postgres") {
        return Err(anyhow!(
            "SQL store backends are not available; use sled:<path>"
        ));
    }
    Ok(StoreType::Sled)
}

#[async_trait]
impl AuthStore for Store {
    async fn store_auth_code(&self, code: &AuthorizationCode) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_auth_code(code).await,
        }
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        match self {
            Self::Sled(db) => db.get_auth_code(code).await,
        }
    }

    async fn delete_auth_code(&self, code: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.delete_auth_code(code).await,
        }
    }

    async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_access_token(token).await,
        }
    }

    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        match self {
            Self::Sled(db) => db.get_access_token(token).await,
        }
    }

    async fn delete_access_token(&self, token: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.delete_access_token(token).await,
        }
    }

    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_refresh_token(token).await,
        }
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        match self {
            Self::Sled(db) => db.get_refresh_token(token).await,
        }
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.delete_refresh_token(token).await,
        }
    }

    async fn store_client(&self, client: &RegisteredClient) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_client(client).await,
        }
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<RegisteredClient>> {
        match self {
            Self::Sled(db) => db.get_client(client_id).await,
        }
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.delete_client(client_id).await,
        }
    }

    async fn list_clients(&self) -> Result<Vec<RegisteredClient>> {
        match self {
            Self::Sled(db) => db.list_clients().await,
        }
    }

    async fn store_user(&self, user: &User) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_user(user).await,
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        match self {
            Self::Sled(db) => db.get_user(user_id).await,
        }
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        match self {
            Self::Sled(db) => db.get_user_by_login(login).await,
        }
    }

    async fn store_auth_request(&self, request: &PendingAuthRequest) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_auth_request(request).await,
        }
    }

    async fn get_auth_request(&self, id: &str) -> Result<Option<PendingAuthRequest>> {
        match self {
            Self::Sled(db) => db.get_auth_request(id).await,
        }
    }

    async fn delete_auth_request(&self, id: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.delete_auth_request(id).await,
        }
    }

    async fn store_session(&self, session: &AuthSession) -> Result<()> {
        match self {
            Self::Sled(db) => db.store_session(session).await,
        }
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<AuthSession>> {
        match self {
            Self::Sled(db) => db.get_session(session_id).await,
        }
    }

    async fn get_session_by_token(&self, access_token: &str) -> Result<Option<AuthSession>> {
        match self {
            Self::Sled(db) => db.get_session_by_token(access_token).await,
        }
    }

    async fn update_session_last_used(&self, session_id: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.update_session_last_used(session_id).await,
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        match self {
            Self::Sled(db) => db.delete_session(session_id).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Self::Sled(db) => db.close().await,
        }
    }
}
