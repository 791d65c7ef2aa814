// ABOUTME: GitHub wire-protocol client for the upstream identity provider
// ABOUTME: Builds authorization URLs, exchanges codes and fetches user/org/team identity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Upstream identity client speaking the GitHub OAuth and REST wire protocol.
//! Base URLs come from configuration so tests can point the client at a local
//! stand-in.

use crate::config::UpstreamConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Scopes requested from the upstream provider
const UPSTREAM_SCOPE: &str = "read:user read:org";
/// REST API version header value
const API_VERSION: &str = "2022-11-28";

/// Errors from the upstream identity provider
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport-level failure
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status from the API
    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),
    /// Error payload in an otherwise successful response
    #[error("upstream error: {error}: {description}")]
    Protocol {
        /// Upstream error code
        error: String,
        /// Upstream error description
        description: String,
    },
}

/// User profile at the upstream provider
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    /// Numeric upstream id
    pub id: i64,
    /// Login name
    pub login: String,
    /// Public email, if exposed
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Organization membership entry
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOrg {
    /// Organization login name
    pub login: String,
}

/// Team membership entry
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTeam {
    /// Team slug
    pub slug: String,
    /// Owning organization
    pub organization: GitHubOrg,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// HTTP client for the upstream identity provider
pub struct GitHubClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    redirect_uri: String,
}

impl GitHubClient {
    /// Create a client; `redirect_uri` is the issuer's /callback endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    pub fn new(config: UpstreamConfig, redirect_uri: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self {
            http,
            config,
            redirect_uri,
        })
    }

    /// Build the upstream authorization URL for a pending request
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorize URL is malformed
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = url::Url::parse(&self.config.authorize_url)
            .context("invalid upstream authorize URL")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", UPSTREAM_SCOPE)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchange an upstream authorization code for an upstream access token.
    ///
    /// The upstream provider reports failures inside a 200 body, so the
    /// `error` field is checked before the token is trusted.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an error payload
    pub async fn exchange_code(&self, code: &str) -> Result<String, UpstreamError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status()));
        }

        let body: TokenExchangeResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(UpstreamError::Protocol {
                error,
                description: body.error_description.unwrap_or_default(),
            });
        }
        body.access_token.ok_or(UpstreamError::Protocol {
            error: "invalid_response".to_owned(),
            description: "token exchange response carried no access_token".to_owned(),
        })
    }

    /// Fetch the authenticated user's profile
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn get_user(&self, token: &str) -> Result<GitHubUser, UpstreamError> {
        self.api_get("/user", token).await
    }

    /// Fetch the authenticated user's organization memberships
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn get_user_orgs(&self, token: &str) -> Result<Vec<GitHubOrg>, UpstreamError> {
        self.api_get("/user/orgs", token).await
    }

    /// Fetch the authenticated user's team memberships
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status
    pub async fn get_user_teams(&self, token: &str) -> Result<Vec<GitHubTeam>, UpstreamError> {
        self.api_get("/user/teams", token).await
    }

    async fn api_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, UpstreamError> {
        let response = self
            .http
            .get(format!("{}{path}", self.config.api_base_url))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "gatehouse-mcp-server")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn test_config() -> UpstreamConfig {
        UpstreamConfig {
            client_id: "app-id".to_owned(),
            client_secret: "app-secret".to_owned(),
            authorize_url: "https://github.example/login/oauth/authorize".to_owned(),
            token_url: "https://github.example/login/oauth/access_token".to_owned(),
            api_base_url: "https://api.github.example".to_owned(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn authorization_url_carries_state_and_scope() {
        let client =
            GitHubClient::new(test_config(), "http://localhost:8080/callback".to_owned()).unwrap();
        let url = client.authorization_url("pending-123").unwrap();
        let parsed = url::Url::parse(&url).unwrap();

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "app-id");
        assert_eq!(pairs["state"], "pending-123");
        assert_eq!(pairs["scope"], "read:user read:org");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8080/callback");
    }
}
