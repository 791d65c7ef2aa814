// ABOUTME: OAuth 2.0 wire models for client registration, authorization and token exchange
// ABOUTME: Implements RFC 7591, RFC 8414 and OAuth 2.0 request/response structures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

use serde::{Deserialize, Serialize};

/// OAuth 2.0 Client Registration Request (RFC 7591)
#[derive(Debug, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Redirect URIs for the authorization code flow
    pub redirect_uris: Vec<String>,
    /// Optional client name for display
    pub client_name: Option<String>,
    /// Optional client URI for information
    pub client_uri: Option<String>,
    /// Grant types the client can use
    pub grant_types: Option<Vec<String>>,
    /// Response types the client can use
    pub response_types: Option<Vec<String>>,
    /// Scopes the client can request
    pub scope: Option<String>,
}

/// OAuth 2.0 Client Registration Response (RFC 7591)
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Unique client identifier
    pub client_id: String,
    /// Client secret; the only time the plaintext leaves the server
    pub client_secret: String,
    /// When the client id was issued (unix seconds)
    pub client_id_issued_at: i64,
    /// When the client secret expires; 0 means never
    pub client_secret_expires_at: i64,
    /// Redirect URIs registered for this client
    pub redirect_uris: Vec<String>,
    /// Grant types allowed for this client
    pub grant_types: Vec<String>,
    /// Response types allowed for this client
    pub response_types: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: String,
    /// Client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Client URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    /// Scopes this client can request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth 2.0 Authorization Request (query parameters of GET /authorize)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type; only `code` is supported
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for the response
    pub redirect_uri: String,
    /// Requested scopes
    pub scope: Option<String>,
    /// State parameter for CSRF protection
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636), mandatory
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (`plain` or `S256`)
    pub code_challenge_method: Option<String>,
    /// RFC 8707 resource indicator
    pub resource: Option<String>,
}

/// OAuth 2.0 Token Request (form body of POST /token)
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`authorization_code` or `refresh_token`)
    pub grant_type: String,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI; must match the one bound to the code
    pub redirect_uri: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Client secret; accepted but not required for PKCE public clients
    pub client_secret: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// PKCE code verifier (RFC 7636)
    pub code_verifier: Option<String>,
    /// RFC 8707 resource indicator
    pub resource: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer access token
    pub access_token: String,
    /// Token type, always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Rotating refresh token
    pub refresh_token: String,
    /// Scopes granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuth2Error {
    fn new(error: &str, description: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", description)
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client(description: &str) -> Self {
        Self::new("invalid_client", description)
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", description)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type(description: &str) -> Self {
        Self::new("unsupported_grant_type", description)
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(description: &str) -> Self {
        Self::new("unsupported_response_type", description)
    }

    /// Create an `invalid_target` error (RFC 8707)
    #[must_use]
    pub fn invalid_target(description: &str) -> Self {
        Self::new("invalid_target", description)
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self::new("access_denied", description)
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self::new("server_error", description)
    }
}

/// Authorization Server Metadata (RFC 8414)
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// Authorization endpoint URL
    pub authorization_endpoint: String,
    /// Token endpoint URL
    pub token_endpoint: String,
    /// Dynamic registration endpoint URL
    pub registration_endpoint: String,
    /// Supported scopes
    pub scopes_supported: Vec<String>,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Supported token endpoint auth methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// Supported PKCE challenge methods
    pub code_challenge_methods_supported: Vec<String>,
    /// PKCE is mandatory on this server
    pub require_pkce: bool,
}

impl AuthorizationServerMetadata {
    /// Build the metadata document for an issuer
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_owned(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            registration_endpoint: format!("{issuer}/register"),
            scopes_supported: vec![
                "mcp:tools".to_owned(),
                "mcp:resources".to_owned(),
                "mcp:prompts".to_owned(),
            ],
            response_types_supported: vec!["code".to_owned()],
            grant_types_supported: vec![
                "authorization_code".to_owned(),
                "refresh_token".to_owned(),
            ],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_post".to_owned(),
                "none".to_owned(),
            ],
            code_challenge_methods_supported: vec!["S256".to_owned()],
            require_pkce: true,
        }
    }
}

/// Protected Resource Metadata (RFC 9728)
#[derive(Debug, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// Resource identifier (the MCP endpoint)
    pub resource: String,
    /// Authorization servers protecting the resource
    pub authorization_servers: Vec<String>,
    /// How bearer tokens may be presented
    pub bearer_methods_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    /// Build the metadata document for an issuer
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        Self {
            resource: format!("{issuer}/mcp"),
            authorization_servers: vec![issuer.to_owned()],
            bearer_methods_supported: vec!["header".to_owned()],
        }
    }
}
