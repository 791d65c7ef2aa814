// ABOUTME: Bearer token middleware for the protected MCP and admin surfaces
// ABOUTME: Resolves Authorization headers into an authenticated principal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Bearer authentication. Every protected request passes through
//! [`BearerAuthMiddleware::authenticate`], which turns an `Authorization`
//! header into an [`AuthPrincipal`] or a categorized failure. Failure reasons
//! are logged distinctly so operators can tell a missing header from an
//! expired token without reading response bodies.

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{AccessToken, User};
use crate::oauth2_server::TokenService;
use crate::store::{AuthStore, Store};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// The authenticated caller of a protected endpoint
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    /// Local user record the token belongs to
    pub user: User,
    /// The access token presented on this request
    pub access_token: AccessToken,
}

/// Validates bearer tokens against the store
#[derive(Clone)]
pub struct BearerAuthMiddleware {
    tokens: TokenService,
    store: Arc<Store>,
}

impl BearerAuthMiddleware {
    /// Create the middleware over the given store
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            tokens: TokenService::new(Arc::clone(&store)),
            store,
        }
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// `AuthRequired` when the header is missing, `AuthInvalid` for malformed
    /// headers, unknown tokens and unknown users, `AuthExpired` for expired
    /// tokens.
    pub async fn authenticate(&self, auth_header: Option<&str>) -> AppResult<AuthPrincipal> {
        let Some(header) = auth_header else {
            debug!("Auth failed: missing Authorization header");
            return Err(AppError::auth_required());
        };

        let token = match header.split_once(' ') {
            Some((scheme, value)) if scheme.eq_ignore_ascii_case("bearer") && !value.is_empty() => {
                value
            }
            _ => {
                debug!("Auth failed: invalid Authorization header format");
                return Err(AppError::auth_invalid("Invalid Authorization header format"));
            }
        };

        let access_token = self.tokens.validate_access_token(token).await.map_err(|e| {
            match e.code {
                ErrorCode::AuthExpired => debug!("Auth failed: token expired"),
                _ => debug!("Auth failed: invalid token"),
            }
            e
        })?;

        let user = self
            .store
            .get_user(&access_token.user_id)
            .await
            .map_err(|e| AppError::storage(e.to_string()))?
            .ok_or_else(|| {
                debug!(user_id = %access_token.user_id, "Auth failed: user not found");
                AppError::auth_invalid("User not found")
            })?;

        debug!(
            user_id = %user.id,
            upstream_login = %user.upstream_login,
            client_id = %access_token.client_id,
            "Auth successful"
        );

        Ok(AuthPrincipal { user, access_token })
    }
}

/// Build the 401 response for a bearer failure (RFC 9728 section 5.1): the
/// `WWW-Authenticate` header points clients at the protected resource
/// metadata document so they can discover the authorization server.
#[must_use]
pub fn unauthorized_response(issuer_url: &str, description: &str) -> warp::reply::Response {
    let body = json!({
        "error": "invalid_token",
        "error_description": description,
    });
    let challenge = format!(
        "Bearer realm=\"MCP Server\", \
         resource_metadata=\"{issuer_url}/.well-known/oauth-protected-resource\""
    );
    warp::http::Response::builder()
        .status(warp::http::StatusCode::UNAUTHORIZED)
        .header("WWW-Authenticate", challenge)
        .header("Content-Type", "application/json")
        .body(warp::hyper::Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            let mut response =
                warp::http::Response::new(warp::hyper::Body::from("unauthorized"));
            *response.status_mut() = warp::http::StatusCode::UNAUTHORIZED;
            response
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::AccessToken;
    use chrono::{Duration, Utc};

    fn temp_store() -> (tempfile::TempDir, Arc<Store>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().to_str().unwrap()).unwrap();
        (dir, Arc::new(store))
    }

    async fn seed_principal(store: &Arc<Store>) -> AccessToken {
        let user = User {
            id: "u1".to_owned(),
            upstream_login: "octocat".to_owned(),
            upstream_id: 42,
            email: None,
            name: None,
            avatar_url: None,
        };
        store.store_user(&user).await.unwrap();

        let token = AccessToken {
            token: "tok-abc".to_owned(),
            token_type: "Bearer".to_owned(),
            client_id: "c1".to_owned(),
            user_id: "u1".to_owned(),
            scope: "mcp:tools".to_owned(),
            resource: None,
            expires_at: Utc::now() + Duration::seconds(60),
            created_at: Utc::now(),
        };
        store.store_access_token(&token).await.unwrap();
        token
    }

    #[tokio::test]
    async fn missing_header_is_auth_required() {
        let (_dir, store) = temp_store();
        let middleware = BearerAuthMiddleware::new(store);
        let err = middleware.authenticate(None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);
    }

    #[tokio::test]
    async fn malformed_header_is_invalid() {
        let (_dir, store) = temp_store();
        let middleware = BearerAuthMiddleware::new(store);

        for header in ["tok-abc", "Basic dXNlcjpwYXNz", "Bearer"] {
            let err = middleware.authenticate(Some(header)).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::AuthInvalid, "{header}");
        }
    }

    #[tokio::test]
    async fn valid_token_resolves_principal() {
        let (_dir, store) = temp_store();
        let token = seed_principal(&store).await;
        let middleware = BearerAuthMiddleware::new(store);

        let principal = middleware
            .authenticate(Some(&format!("Bearer {}", token.token)))
            .await
            .unwrap();
        assert_eq!(principal.user.upstream_login, "octocat");
        assert_eq!(principal.access_token.client_id, "c1");

        // Scheme matching is case-insensitive
        let principal = middleware
            .authenticate(Some(&format!("bearer {}", token.token)))
            .await
            .unwrap();
        assert_eq!(principal.user.id, "u1");
    }

    #[tokio::test]
    async fn token_for_missing_user_is_rejected() {
        let (_dir, store) = temp_store();
        let token = AccessToken {
            token: "orphan".to_owned(),
            token_type: "Bearer".to_owned(),
            client_id: "c1".to_owned(),
            user_id: "ghost".to_owned(),
            scope: String::new(),
            resource: None,
            expires_at: Utc::now() + Duration::seconds(60),
            created_at: Utc::now(),
        };
        store.store_access_token(&token).await.unwrap();

        let middleware = BearerAuthMiddleware::new(store);
        let err = middleware
            .authenticate(Some("Bearer orphan"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[test]
    fn unauthorized_response_carries_challenge() {
        let response = unauthorized_response("http://localhost:8080", "Access token expired");
        assert_eq!(response.status(), 401);
        let challenge = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.starts_with("Bearer realm=\"MCP Server\""));
        assert!(challenge.contains("/.well-known/oauth-protected-resource"));
    }

    #[test]
    fn unauthorized_response_stays_401_when_header_is_unbuildable() {
        // A newline makes the challenge an invalid header value, forcing the
        // builder onto its fallback path
        let response = unauthorized_response("http://issuer\nwith-newline", "nope");
        assert_eq!(response.status(), 401);
    }
}
