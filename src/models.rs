// ABOUTME: Persisted data models for users, clients, tokens and sessions
// ABOUTME: Every struct here is serialized as JSON into a store collection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Persisted entities shared by the store, the authorization server and the
//! session layer. All timestamps are UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local user account federated from the upstream identity provider.
///
/// Keyed by `id` in the `users` collection and by `upstream_login` in the
/// `users_by_login` index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Opaque local user id
    pub id: String,
    /// Login name at the upstream provider
    pub upstream_login: String,
    /// Numeric id at the upstream provider
    pub upstream_id: i64,
    /// Email address, if the upstream profile exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Avatar image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// One-time authorization code bound to a client, user and PKCE challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The opaque code value (primary key)
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// Space-separated granted scopes
    pub scope: String,
    /// PKCE code challenge from the authorization request
    pub code_challenge: String,
    /// PKCE challenge method (`S256` or `plain`)
    pub code_challenge_method: String,
    /// RFC 8707 resource indicator, if the client supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// User who approved the authorization
    pub user_id: String,
    /// Expiry instant (10 minutes after issuance)
    pub expires_at: DateTime<Utc>,
    /// Issuance instant
    pub created_at: DateTime<Utc>,
}

/// Issued bearer access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The opaque token value (primary key)
    pub token: String,
    /// Token type, always `Bearer`
    pub token_type: String,
    /// Client the token was issued to
    pub client_id: String,
    /// User the token acts for
    pub user_id: String,
    /// Space-separated granted scopes
    pub scope: String,
    /// RFC 8707 resource indicator carried over from the grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Expiry instant (1 hour after issuance)
    pub expires_at: DateTime<Utc>,
    /// Issuance instant
    pub created_at: DateTime<Utc>,
}

/// Issued refresh token, rotated on every use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    /// The opaque token value (primary key)
    pub token: String,
    /// Client the token was issued to
    pub client_id: String,
    /// User the token acts for
    pub user_id: String,
    /// Space-separated granted scopes
    pub scope: String,
    /// RFC 8707 resource indicator carried over from the grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Expiry instant (30 days after issuance)
    pub expires_at: DateTime<Utc>,
    /// Issuance instant
    pub created_at: DateTime<Utc>,
}

/// Registered OAuth client, dynamic (RFC 7591) or static (config/admin)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Client identifier (primary key)
    pub client_id: String,
    /// Hex SHA-256 digest of the client secret; never the plaintext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_hash: Option<String>,
    /// Human-readable client name
    pub client_name: String,
    /// Informational client URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    /// Registered redirect URIs; authorization requests must match exactly
    pub redirect_uris: Vec<String>,
    /// Grant types the client may use
    pub grant_types: Vec<String>,
    /// Response types the client may use
    pub response_types: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: String,
    /// True when seeded from config or created via the admin endpoints
    pub is_static: bool,
    /// Registration instant
    pub created_at: DateTime<Utc>,
}

/// Audit record tying an MCP session to the principal that opened it.
///
/// Keyed by `session_id` in the `sessions` collection and by `access_token`
/// in the `sessions_by_token` index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Session identifier (primary key)
    pub session_id: String,
    /// User the session belongs to
    pub user_id: String,
    /// Client the session's access token was issued to
    pub client_id: String,
    /// Access token presented when the session was created
    pub access_token: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Refreshed on each completed request
    pub last_used_at: DateTime<Utc>,
}

/// In-flight authorization request awaiting the upstream callback.
///
/// The record id doubles as the `state` value passed to the upstream
/// provider; the client's own `state` is held inside for the final redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthRequest {
    /// Request identifier, also the upstream `state` (primary key)
    pub id: String,
    /// Client that initiated the authorization
    pub client_id: String,
    /// Redirect URI validated at /authorize time
    pub redirect_uri: String,
    /// Requested scopes
    pub scope: String,
    /// The client's original `state`, echoed back on the final redirect
    pub state: String,
    /// PKCE code challenge
    pub code_challenge: String,
    /// PKCE challenge method
    pub code_challenge_method: String,
    /// RFC 8707 resource indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Expiry instant (10 minutes after creation)
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthRequest {
    /// Whether the request has passed its expiry instant
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl AuthorizationCode {
    /// Whether the code has passed its expiry instant
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl AccessToken {
    /// Whether the token has passed its expiry instant
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl RefreshToken {
    /// Whether the token has passed its expiry instant
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
