// ABOUTME: OAuth 2.1 authorization server core: authorize, callback and token grants
// ABOUTME: Brokers between local clients and the upstream identity provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Authorization server endpoint logic. The HTTP layer in `routes` turns the
//! outcomes produced here into redirects and JSON responses; everything
//! protocol-visible (error codes, parameter binding, one-time-use semantics)
//! lives in this module.

use super::client_registration::ClientRegistrationManager;
use super::models::{
    AuthorizeRequest, ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error,
    TokenRequest, TokenResponse,
};
use super::pkce::{validate_code_challenge, validate_pkce};
use super::tokens::{
    TokenService, PENDING_REQUEST_ID_LENGTH, PENDING_REQUEST_TTL_SECS, USER_ID_LENGTH,
};
use crate::config::StaticClientConfig;
use crate::models::{PendingAuthRequest, RegisteredClient, User};
use crate::store::{AuthStore, Store};
use crate::upstream::{AllowlistPolicy, GitHubClient, GitHubUser};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Failure from the redirect-based authorization endpoints.
///
/// When a usable redirect URI is known the error travels back to the client
/// as query parameters on a 302; before one is established (or when the URI
/// does not parse) the error is returned directly as a 400 JSON body.
#[derive(Debug)]
pub enum AuthFlowError {
    /// Redirect the user agent to this URL, which carries the error params
    Redirect(String),
    /// No usable redirect URI; answer with a direct error response
    Direct(OAuth2Error),
}

/// The OAuth 2.1 authorization server fronting one upstream identity provider
pub struct AuthorizationServer {
    issuer_url: String,
    store: Arc<Store>,
    tokens: TokenService,
    registration: ClientRegistrationManager,
    upstream: Arc<GitHubClient>,
    policy: AllowlistPolicy,
}

impl AuthorizationServer {
    /// Assemble the server from its collaborators
    #[must_use]
    pub fn new(
        issuer_url: String,
        store: Arc<Store>,
        upstream: Arc<GitHubClient>,
        policy: AllowlistPolicy,
    ) -> Self {
        Self {
            issuer_url,
            tokens: TokenService::new(Arc::clone(&store)),
            registration: ClientRegistrationManager::new(Arc::clone(&store)),
            store,
            upstream,
            policy,
        }
    }

    /// Issuer URL this server advertises in metadata
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Token service for bearer validation elsewhere in the stack
    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Registration manager, shared with the admin surface
    #[must_use]
    pub const fn registration(&self) -> &ClientRegistrationManager {
        &self.registration
    }

    /// Handle GET/POST /authorize: validate the request, park it as a pending
    /// authorization request, and produce the upstream authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthFlowError`] carrying the protocol error; redirect
    /// form once the `redirect_uri` is known to be safe, direct form before
    /// that.
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<String, AuthFlowError> {
        let state = request.state.as_deref().unwrap_or_default();

        if request.response_type != "code" {
            return Err(error_outcome(
                &request.redirect_uri,
                &OAuth2Error::unsupported_response_type("Only 'code' response_type is supported"),
                state,
            ));
        }

        // PKCE is mandatory; an absent method means S256
        let code_challenge = request.code_challenge.as_deref().unwrap_or_default();
        let code_challenge_method = request.code_challenge_method.as_deref().unwrap_or_default();
        if let Err(e) = validate_code_challenge(code_challenge, code_challenge_method) {
            return Err(error_outcome(&request.redirect_uri, &e, state));
        }

        let client = match self.store.get_client(&request.client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                return Err(error_outcome(
                    &request.redirect_uri,
                    &OAuth2Error::invalid_client("Unknown client_id"),
                    state,
                ));
            }
            Err(e) => {
                warn!(client_id = %request.client_id, "Client lookup failed: {e}");
                return Err(error_outcome(
                    &request.redirect_uri,
                    &OAuth2Error::server_error("client lookup failed"),
                    state,
                ));
            }
        };

        if !redirect_uri_registered(&client, &request.redirect_uri) {
            return Err(error_outcome(
                &request.redirect_uri,
                &OAuth2Error::invalid_request("Invalid redirect_uri"),
                state,
            ));
        }

        let now = Utc::now();
        let pending = PendingAuthRequest {
            id: self.generate_id(PENDING_REQUEST_ID_LENGTH, &request.redirect_uri, state)?,
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scope: request.scope.clone().unwrap_or_default(),
            state: state.to_owned(),
            code_challenge: code_challenge.to_owned(),
            code_challenge_method: code_challenge_method.to_owned(),
            resource: request.resource.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(PENDING_REQUEST_TTL_SECS),
        };
        if let Err(e) = self.store.store_auth_request(&pending).await {
            warn!("Failed to store pending authorization request: {e}");
            return Err(error_outcome(
                &request.redirect_uri,
                &OAuth2Error::server_error("failed to store authorization request"),
                state,
            ));
        }

        info!(
            client_id = %request.client_id,
            auth_request_id = %pending.id,
            "Authorization request accepted, redirecting upstream"
        );

        self.upstream.authorization_url(&pending.id).map_err(|e| {
            warn!("Failed to build upstream authorization URL: {e}");
            error_outcome(
                &request.redirect_uri,
                &OAuth2Error::server_error("failed to build upstream URL"),
                state,
            )
        })
    }

    /// Handle GET /callback from the upstream provider.
    ///
    /// `state` is the pending request id minted by [`Self::authorize`]; the
    /// pending record is deleted before any other check so it can never be
    /// replayed.
    ///
    /// # Errors
    ///
    /// Direct errors before the pending request is resolved, redirect errors
    /// (to the client's registered URI) after.
    pub async fn callback(
        &self,
        code: Option<String>,
        state: Option<String>,
    ) -> Result<String, AuthFlowError> {
        let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
            AuthFlowError::Direct(OAuth2Error::invalid_request("Missing authorization code"))
        })?;
        let state = state
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthFlowError::Direct(OAuth2Error::invalid_request("Missing state")))?;

        let pending = match self.store.get_auth_request(&state).await {
            Ok(Some(pending)) => pending,
            _ => {
                return Err(AuthFlowError::Direct(OAuth2Error::invalid_request(
                    "Invalid or expired authorization request",
                )));
            }
        };

        // One-time use, deleted even if a later step fails
        if let Err(e) = self.store.delete_auth_request(&state).await {
            warn!("Failed to delete pending authorization request: {e}");
        }

        let fail = |error: OAuth2Error| error_outcome(&pending.redirect_uri, &error, &pending.state);

        if pending.is_expired() {
            return Err(fail(OAuth2Error::access_denied(
                "Authorization request expired",
            )));
        }

        let upstream_token = self.upstream.exchange_code(&code).await.map_err(|e| {
            warn!("Upstream code exchange failed: {e}");
            fail(OAuth2Error::server_error(
                "Failed to authenticate with upstream provider",
            ))
        })?;

        let upstream_user = self.upstream.get_user(&upstream_token).await.map_err(|e| {
            warn!("Upstream user lookup failed: {e}");
            fail(OAuth2Error::server_error("Failed to get user info"))
        })?;

        if !self
            .policy
            .is_user_authorized(&self.upstream, &upstream_token, &upstream_user)
            .await
        {
            return Err(fail(OAuth2Error::access_denied("User not authorized")));
        }

        let user = self.upsert_user(&upstream_user).await.map_err(|e| {
            warn!("Failed to persist user: {e}");
            fail(OAuth2Error::server_error("Failed to store user"))
        })?;

        let auth_code = self
            .tokens
            .mint_auth_code(
                &pending.client_id,
                &user.id,
                &pending.redirect_uri,
                &pending.scope,
                &pending.code_challenge,
                &pending.code_challenge_method,
                pending.resource.clone(),
            )
            .await
            .map_err(|e| {
                warn!("Failed to mint authorization code: {e}");
                fail(OAuth2Error::server_error(
                    "Failed to generate authorization code",
                ))
            })?;

        info!(
            client_id = %pending.client_id,
            user_id = %user.id,
            "Issued authorization code"
        );

        let mut url = url::Url::parse(&pending.redirect_uri).map_err(|_| {
            AuthFlowError::Direct(OAuth2Error::server_error("stored redirect URI is invalid"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("code", &auth_code.code);
            if !pending.state.is_empty() {
                query.append_pair("state", &pending.state);
            }
        }
        Ok(url.into())
    }

    /// Handle POST /token for both supported grants
    ///
    /// # Errors
    ///
    /// Returns an [`OAuth2Error`] rendered as a 400 JSON body
    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        match request.grant_type.as_str() {
            "authorization_code" => self.authorization_code_grant(request).await,
            "refresh_token" => self.refresh_token_grant(request).await,
            _ => Err(OAuth2Error::unsupported_grant_type(
                "Only authorization_code and refresh_token grants are supported",
            )),
        }
    }

    /// Register a dynamic client (RFC 7591)
    ///
    /// # Errors
    ///
    /// Returns an [`OAuth2Error`] if validation or persistence fails
    pub async fn register(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        self.registration.register_client(request).await
    }

    /// Seed configured static clients at startup
    ///
    /// # Errors
    ///
    /// Returns an error if any store write fails
    pub async fn seed_static_clients(&self, clients: &[StaticClientConfig]) -> Result<()> {
        for config in clients {
            self.registration.seed_static_client(config).await?;
        }
        Ok(())
    }

    async fn authorization_code_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("code is required"))?;
        let client_id = request.client_id.as_deref().unwrap_or_default();

        let auth_code = self
            .store
            .get_auth_code(code)
            .await
            .map_err(|_| OAuth2Error::server_error("storage failure"))?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid authorization code"))?;

        // One-time use: the code is gone before any further validation, so a
        // second redemption attempt fails even when this one does too
        if let Err(e) = self.store.delete_auth_code(code).await {
            warn!("Failed to delete authorization code: {e}");
        }

        if auth_code.is_expired() {
            return Err(OAuth2Error::invalid_grant("Authorization code expired"));
        }
        if auth_code.client_id != client_id {
            return Err(OAuth2Error::invalid_grant("Client ID mismatch"));
        }
        if auth_code.redirect_uri != request.redirect_uri.as_deref().unwrap_or_default() {
            return Err(OAuth2Error::invalid_grant("Redirect URI mismatch"));
        }

        validate_pkce(
            request.code_verifier.as_deref().unwrap_or_default(),
            &auth_code.code_challenge,
            &auth_code.code_challenge_method,
        )?;

        // RFC 8707: a resource presented here must match the one bound at
        // authorization time
        if let (Some(requested), Some(bound)) =
            (request.resource.as_deref(), auth_code.resource.as_deref())
        {
            if !requested.is_empty() && requested != bound {
                return Err(OAuth2Error::invalid_target("Resource mismatch"));
            }
        }

        let (access, refresh) = self
            .tokens
            .issue_token_pair(
                &auth_code.user_id,
                client_id,
                &auth_code.scope,
                auth_code.resource.clone(),
            )
            .await
            .map_err(|e| {
                warn!("Failed to issue token pair: {e}");
                OAuth2Error::server_error("Failed to generate tokens")
            })?;

        info!(client_id = %client_id, user_id = %auth_code.user_id, "Redeemed authorization code");
        Ok(token_response(&access, &refresh))
    }

    async fn refresh_token_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let token = request
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("refresh_token is required"))?;
        let client_id = request.client_id.as_deref().unwrap_or_default();

        let refresh = self
            .store
            .get_refresh_token(token)
            .await
            .map_err(|_| OAuth2Error::server_error("storage failure"))?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        if refresh.is_expired() {
            if let Err(e) = self.store.delete_refresh_token(token).await {
                warn!("Failed to delete expired refresh token: {e}");
            }
            return Err(OAuth2Error::invalid_grant("Refresh token expired"));
        }
        if refresh.client_id != client_id {
            return Err(OAuth2Error::invalid_grant("Client ID mismatch"));
        }

        // Rotation: the presented token dies before its replacement is minted
        if let Err(e) = self.store.delete_refresh_token(token).await {
            warn!("Failed to rotate refresh token: {e}");
        }

        let (access, new_refresh) = self
            .tokens
            .issue_token_pair(
                &refresh.user_id,
                client_id,
                &refresh.scope,
                refresh.resource.clone(),
            )
            .await
            .map_err(|e| {
                warn!("Failed to issue token pair: {e}");
                OAuth2Error::server_error("Failed to generate tokens")
            })?;

        info!(client_id = %client_id, user_id = %refresh.user_id, "Rotated refresh token");
        Ok(token_response(&access, &new_refresh))
    }

    /// Create or update the local user record for an upstream identity.
    /// Existing users keep their local id so issued grants stay valid.
    async fn upsert_user(&self, upstream: &GitHubUser) -> Result<User> {
        let user = match self.store.get_user_by_login(&upstream.login).await? {
            Some(mut existing) => {
                existing.upstream_id = upstream.id;
                existing.email.clone_from(&upstream.email);
                existing.name.clone_from(&upstream.name);
                existing.avatar_url.clone_from(&upstream.avatar_url);
                existing
            }
            None => User {
                id: TokenService::generate_secure_token(USER_ID_LENGTH)
                    .map_err(|e| anyhow::anyhow!("user id generation failed: {e}"))?,
                upstream_login: upstream.login.clone(),
                upstream_id: upstream.id,
                email: upstream.email.clone(),
                name: upstream.name.clone(),
                avatar_url: upstream.avatar_url.clone(),
            },
        };
        self.store.store_user(&user).await?;
        Ok(user)
    }

    fn generate_id(
        &self,
        num_bytes: usize,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, AuthFlowError> {
        TokenService::generate_secure_token(num_bytes).map_err(|_| {
            error_outcome(
                redirect_uri,
                &OAuth2Error::server_error("system RNG failure"),
                state,
            )
        })
    }
}

fn redirect_uri_registered(client: &RegisteredClient, redirect_uri: &str) -> bool {
    !redirect_uri.is_empty() && client.redirect_uris.iter().any(|uri| uri == redirect_uri)
}

/// Turn a protocol error into the right flow outcome: a redirect carrying
/// error query parameters when the URI is present and parseable, a direct
/// error otherwise.
fn error_outcome(redirect_uri: &str, error: &OAuth2Error, state: &str) -> AuthFlowError {
    if redirect_uri.is_empty() {
        return AuthFlowError::Direct(error.clone());
    }
    let Ok(mut url) = url::Url::parse(redirect_uri) else {
        return AuthFlowError::Direct(error.clone());
    };
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("error", &error.error);
        if let Some(ref description) = error.error_description {
            query.append_pair("error_description", description);
        }
        if !state.is_empty() {
            query.append_pair("state", state);
        }
    }
    AuthFlowError::Redirect(url.into())
}

fn token_response(
    access: &crate::models::AccessToken,
    refresh: &crate::models::RefreshToken,
) -> TokenResponse {
    TokenResponse {
        access_token: access.token.clone(),
        token_type: "Bearer".to_owned(),
        expires_in: (access.expires_at - Utc::now()).num_seconds(),
        refresh_token: refresh.token.clone(),
        scope: if access.scope.is_empty() {
            None
        } else {
            Some(access.scope.clone())
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::super::pkce::s256_challenge;
    use super::*;
    use crate::config::{PolicyConfig, UpstreamConfig};

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    fn test_server() -> (tempfile::TempDir, AuthorizationServer) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().to_str().unwrap()).unwrap());
        let upstream = Arc::new(
            GitHubClient::new(
                UpstreamConfig {
                    client_id: "app-id".to_owned(),
                    client_secret: "app-secret".to_owned(),
                    authorize_url: "https://github.example/login/oauth/authorize".to_owned(),
                    token_url: "https://github.example/login/oauth/access_token".to_owned(),
                    api_base_url: "https://api.github.example".to_owned(),
                    timeout_secs: 1,
                },
                "http://localhost:8080/callback".to_owned(),
            )
            .unwrap(),
        );
        let policy = AllowlistPolicy::new(PolicyConfig::default());
        let server =
            AuthorizationServer::new("http://localhost:8080".to_owned(), store, upstream, policy);
        (dir, server)
    }

    async fn registered_client(server: &AuthorizationServer) -> ClientRegistrationResponse {
        server
            .register(ClientRegistrationRequest {
                redirect_uris: vec!["http://localhost:3000/cb".to_owned()],
                client_name: Some("Test client".to_owned()),
                client_uri: None,
                grant_types: None,
                response_types: None,
                scope: None,
            })
            .await
            .unwrap()
    }

    fn authorize_request(client_id: &str) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".to_owned(),
            client_id: client_id.to_owned(),
            redirect_uri: "http://localhost:3000/cb".to_owned(),
            scope: Some("mcp:tools".to_owned()),
            state: Some("xyz".to_owned()),
            code_challenge: Some(s256_challenge(VERIFIER)),
            code_challenge_method: Some("S256".to_owned()),
            resource: None,
        }
    }

    #[tokio::test]
    async fn authorize_requires_code_response_type() {
        let (_dir, server) = test_server();
        let mut request = authorize_request("whatever");
        request.response_type = "token".to_owned();

        let err = server.authorize(request).await.unwrap_err();
        match err {
            AuthFlowError::Redirect(url) => {
                assert!(url.contains("error=unsupported_response_type"));
                assert!(url.contains("state=xyz"));
            }
            AuthFlowError::Direct(_) => panic!("expected redirect error"),
        }
    }

    #[tokio::test]
    async fn authorize_rejects_missing_pkce() {
        let (_dir, server) = test_server();
        let mut request = authorize_request("whatever");
        request.code_challenge = None;

        let err = server.authorize(request).await.unwrap_err();
        match err {
            AuthFlowError::Redirect(url) => assert!(url.contains("error=invalid_request")),
            AuthFlowError::Direct(_) => panic!("expected redirect error"),
        }
    }

    #[tokio::test]
    async fn authorize_rejects_unknown_client_and_foreign_redirect() {
        let (_dir, server) = test_server();

        let err = server
            .authorize(authorize_request("nope"))
            .await
            .unwrap_err();
        match err {
            AuthFlowError::Redirect(url) => assert!(url.contains("error=invalid_client")),
            AuthFlowError::Direct(_) => panic!("expected redirect error"),
        }

        let client = registered_client(&server).await;
        let mut request = authorize_request(&client.client_id);
        request.redirect_uri = "http://localhost:9999/other".to_owned();
        let err = server.authorize(request).await.unwrap_err();
        match err {
            AuthFlowError::Redirect(url) => assert!(url.contains("error=invalid_request")),
            AuthFlowError::Direct(_) => panic!("expected redirect error"),
        }
    }

    #[tokio::test]
    async fn authorize_parks_pending_request_and_points_upstream() {
        let (_dir, server) = test_server();
        let client = registered_client(&server).await;

        let url = server
            .authorize(authorize_request(&client.client_id))
            .await
            .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("github.example"));

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        let pending_id = &pairs["state"];
        let pending = server
            .store
            .get_auth_request(pending_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.client_id, client.client_id);
        assert_eq!(pending.state, "xyz");
        assert_eq!(pending.code_challenge_method, "S256");
    }

    #[tokio::test]
    async fn callback_rejects_unknown_state() {
        let (_dir, server) = test_server();
        let err = server
            .callback(Some("abc".to_owned()), Some("unknown".to_owned()))
            .await
            .unwrap_err();
        match err {
            AuthFlowError::Direct(e) => assert_eq!(e.error, "invalid_request"),
            AuthFlowError::Redirect(_) => panic!("expected direct error"),
        }
    }

    async fn minted_code(
        server: &AuthorizationServer,
        client_id: &str,
        resource: Option<String>,
    ) -> String {
        server
            .tokens
            .mint_auth_code(
                client_id,
                "user-1",
                "http://localhost:3000/cb",
                "mcp:tools",
                &s256_challenge(VERIFIER),
                "S256",
                resource,
            )
            .await
            .unwrap()
            .code
    }

    fn code_grant(client_id: &str, code: &str, verifier: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "authorization_code".to_owned(),
            code: Some(code.to_owned()),
            redirect_uri: Some("http://localhost:3000/cb".to_owned()),
            client_id: Some(client_id.to_owned()),
            client_secret: None,
            refresh_token: None,
            code_verifier: Some(verifier.to_owned()),
            resource: None,
        }
    }

    #[tokio::test]
    async fn code_redeems_exactly_once() {
        let (_dir, server) = test_server();
        let code = minted_code(&server, "c1", None).await;

        let response = server
            .token(code_grant("c1", &code, VERIFIER))
            .await
            .unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert!(response.expires_in > 3500);
        assert_eq!(response.scope.as_deref(), Some("mcp:tools"));

        let err = server
            .token(code_grant("c1", &code, VERIFIER))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[tokio::test]
    async fn wrong_verifier_burns_the_code() {
        let (_dir, server) = test_server();
        let code = minted_code(&server, "c1", None).await;

        let err = server
            .token(code_grant("c1", &code, "A".repeat(43).as_str()))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");

        // The failed attempt consumed the code
        let err = server
            .token(code_grant("c1", &code, VERIFIER))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[tokio::test]
    async fn code_is_bound_to_client_and_redirect_uri() {
        let (_dir, server) = test_server();

        let code = minted_code(&server, "c1", None).await;
        let err = server
            .token(code_grant("other", &code, VERIFIER))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");

        let code = minted_code(&server, "c1", None).await;
        let mut request = code_grant("c1", &code, VERIFIER);
        request.redirect_uri = Some("http://localhost:3000/elsewhere".to_owned());
        let err = server.token(request).await.unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[tokio::test]
    async fn resource_mismatch_is_invalid_target() {
        let (_dir, server) = test_server();
        let code = minted_code(&server, "c1", Some("https://mcp.example/mcp".to_owned())).await;

        let mut request = code_grant("c1", &code, VERIFIER);
        request.resource = Some("https://other.example".to_owned());
        let err = server.token(request).await.unwrap_err();
        assert_eq!(err.error, "invalid_target");
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_the_old_token() {
        let (_dir, server) = test_server();
        let code = minted_code(&server, "c1", None).await;
        let first = server
            .token(code_grant("c1", &code, VERIFIER))
            .await
            .unwrap();

        let refresh_request = |token: &str| TokenRequest {
            grant_type: "refresh_token".to_owned(),
            code: None,
            redirect_uri: None,
            client_id: Some("c1".to_owned()),
            client_secret: None,
            refresh_token: Some(token.to_owned()),
            code_verifier: None,
            resource: None,
        };

        let second = server
            .token(refresh_request(&first.refresh_token))
            .await
            .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_ne!(second.access_token, first.access_token);

        let err = server
            .token(refresh_request(&first.refresh_token))
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[tokio::test]
    async fn refresh_requires_matching_client() {
        let (_dir, server) = test_server();
        let code = minted_code(&server, "c1", None).await;
        let pair = server
            .token(code_grant("c1", &code, VERIFIER))
            .await
            .unwrap();

        let err = server
            .token(TokenRequest {
                grant_type: "refresh_token".to_owned(),
                code: None,
                redirect_uri: None,
                client_id: Some("other".to_owned()),
                client_secret: None,
                refresh_token: Some(pair.refresh_token),
                code_verifier: None,
                resource: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error, "invalid_grant");
    }

    #[tokio::test]
    async fn unknown_grant_type_is_rejected() {
        let (_dir, server) = test_server();
        let err = server
            .token(TokenRequest {
                grant_type: "password".to_owned(),
                code: None,
                redirect_uri: None,
                client_id: None,
                client_secret: None,
                refresh_token: None,
                code_verifier: None,
                resource: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error, "unsupported_grant_type");
    }
}
