// ABOUTME: Persistent store abstraction with named collections and secondary indices
// ABOUTME: Defines the AuthStore trait implemented by pluggable storage backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! # Persistent Store Abstraction
//!
//! The authorization server and session layer persist their state through the
//! [`AuthStore`] trait. Backends keep one named collection per entity kind
//! plus two secondary indices (`users_by_login`, `sessions_by_token`) whose
//! entries are written and removed atomically with the primary record.
//!
//! Lookups return `Option`: absence is an expected outcome, not an error.
//! Errors are reserved for backend failures.

/// Store factory with automatic backend detection
pub mod factory;
/// Embedded key-value backend built on sled
pub mod sled_backend;

pub use factory::Store;
pub use sled_backend::SledStore;

use crate::models::{
    AccessToken, AuthSession, AuthorizationCode, PendingAuthRequest, RefreshToken,
    RegisteredClient, User,
};
use anyhow::Result;
use async_trait::async_trait;

/// Persistent store for OAuth and session state
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Persist an authorization code
    async fn store_auth_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Look up an authorization code by value
    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Remove an authorization code
    async fn delete_auth_code(&self, code: &str) -> Result<()>;

    /// Persist an access token
    async fn store_access_token(&self, token: &AccessToken) -> Result<()>;

    /// Look up an access token by value
    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// Remove an access token
    async fn delete_access_token(&self, token: &str) -> Result<()>;

    /// Persist a refresh token
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()>;

    /// Look up a refresh token by value
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Remove a refresh token
    async fn delete_refresh_token(&self, token: &str) -> Result<()>;

    /// Persist a registered client
    async fn store_client(&self, client: &RegisteredClient) -> Result<()>;

    /// Look up a client by id
    async fn get_client(&self, client_id: &str) -> Result<Option<RegisteredClient>>;

    /// Remove a registered client
    async fn delete_client(&self, client_id: &str) -> Result<()>;

    /// List every registered client
    async fn list_clients(&self) -> Result<Vec<RegisteredClient>>;

    /// Persist a user and its `users_by_login` index entry atomically
    async fn store_user(&self, user: &User) -> Result<()>;

    /// Look up a user by local id
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Look up a user through the `users_by_login` index
    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>>;

    /// Persist a pending authorization request
    async fn store_auth_request(&self, request: &PendingAuthRequest) -> Result<()>;

    /// Look up a pending authorization request by id
    async fn get_auth_request(&self, id: &str) -> Result<Option<PendingAuthRequest>>;

    /// Remove a pending authorization request
    async fn delete_auth_request(&self, id: &str) -> Result<()>;

    /// Persist a session audit record and its `sessions_by_token` index entry
    /// atomically
    async fn store_session(&self, session: &AuthSession) -> Result<()>;

    /// Look up a session audit record by id
    async fn get_session(&self, session_id: &str) -> Result<Option<AuthSession>>;

    /// Look up a session through the `sessions_by_token` index
    async fn get_session_by_token(&self, access_token: &str) -> Result<Option<AuthSession>>;

    /// Refresh a session's last-used timestamp
    async fn update_session_last_used(&self, session_id: &str) -> Result<()>;

    /// Remove a session audit record and its index entry atomically
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Flush and release the backend
    async fn close(&self) -> Result<()>;
}
