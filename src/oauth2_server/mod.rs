// ABOUTME: OAuth 2.1 authorization server fronting a single upstream identity provider
// ABOUTME: Provides RFC 7591 client registration, PKCE-enforced code flow and token endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

/// Admin endpoints for static client management
pub mod admin;
/// RFC 7591 dynamic client registration implementation
pub mod client_registration;
/// OAuth 2.0 authorization server endpoints
pub mod endpoints;
/// OAuth 2.0 data models and request/response types
pub mod models;
/// PKCE (RFC 7636) challenge and verifier validation
pub mod pkce;
/// HTTP routes for the authorization server
pub mod routes;
/// Opaque token and authorization code lifecycle
pub mod tokens;

pub use admin::AdminService;
pub use client_registration::ClientRegistrationManager;
pub use endpoints::{AuthFlowError, AuthorizationServer};
pub use routes::oauth2_routes;
pub use models::{
    AuthorizeRequest, ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error,
    TokenRequest, TokenResponse,
};
pub use tokens::TokenService;
