// ABOUTME: Environment-based configuration for server, store, upstream and policy settings
// ABOUTME: Loads typed sub-configs from environment variables with sensible defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Environment-based configuration management.
//!
//! All configuration comes from environment variables; there is no config
//! file layer. Secrets may be supplied directly or through `_FILE` variants
//! pointing at files (for container secret mounts).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub http_host: String,
    /// Port to bind the HTTP listener to
    pub http_port: u16,
    /// Public issuer URL; all advertised endpoints hang off this
    pub issuer_url: String,
    /// Database URL for the store factory (`sled:<path>` or a bare path)
    pub database_url: String,
    /// Upstream identity provider settings
    pub upstream: UpstreamConfig,
    /// User/org/team allowlist
    pub policy: PolicyConfig,
    /// Static clients seeded into the store at startup
    pub static_clients: Vec<StaticClientConfig>,
    /// Session layer tuning
    pub session: SessionConfig,
}

/// Upstream identity provider (GitHub wire protocol) settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// OAuth app client id at the upstream provider
    pub client_id: String,
    /// OAuth app client secret at the upstream provider
    pub client_secret: String,
    /// Authorization endpoint
    pub authorize_url: String,
    /// Token exchange endpoint
    pub token_url: String,
    /// REST API base URL
    pub api_base_url: String,
    /// HTTP timeout in seconds for upstream calls
    pub timeout_secs: u64,
}

/// Allowlist policy configuration. Empty lists allow everyone.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    /// Allowed upstream login names (case-insensitive)
    pub allowed_users: Vec<String>,
    /// Allowed organization names (case-insensitive)
    pub allowed_orgs: Vec<String>,
    /// Allowed `org/team` slugs (case-insensitive)
    pub allowed_teams: Vec<String>,
}

impl PolicyConfig {
    /// Whether any allowlist rule is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed_users.is_empty()
            && self.allowed_orgs.is_empty()
            && self.allowed_teams.is_empty()
    }
}

/// Static client seeded from the environment at startup
#[derive(Debug, Clone, Deserialize)]
pub struct StaticClientConfig {
    /// Client identifier
    pub client_id: String,
    /// Plaintext secret; hashed before it reaches the store
    pub client_secret: String,
    /// Human-readable name
    pub client_name: String,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
}

/// Session layer tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Seconds between SSE keepalive comment frames
    pub keepalive_secs: u64,
    /// Capacity of each session's server-push queue
    pub push_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            push_queue_capacity: 10,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable fails to parse, a `_FILE`
    /// secret cannot be read, or `STATIC_CLIENTS` is not valid JSON
    pub fn from_env() -> Result<Self> {
        let http_port: u16 = env_var_or("HTTP_PORT", "8080")
            .parse()
            .context("Invalid HTTP_PORT value")?;
        let issuer_url = env_var_or("ISSUER_URL", &format!("http://localhost:{http_port}"));

        Ok(Self {
            http_host: env_var_or("HTTP_HOST", "127.0.0.1"),
            http_port,
            issuer_url: issuer_url.trim_end_matches('/').to_owned(),
            database_url: env_var_or("DATABASE_URL", "sled:data/gatehouse.sled"),
            upstream: UpstreamConfig {
                client_id: secret_var("GITHUB_CLIENT_ID")?.unwrap_or_default(),
                client_secret: secret_var("GITHUB_CLIENT_SECRET")?.unwrap_or_default(),
                authorize_url: env_var_or(
                    "GITHUB_AUTHORIZE_URL",
                    "https://github.com/login/oauth/authorize",
                ),
                token_url: env_var_or(
                    "GITHUB_TOKEN_URL",
                    "https://github.com/login/oauth/access_token",
                ),
                api_base_url: env_var_or("GITHUB_API_BASE_URL", "https://api.github.com"),
                timeout_secs: env_var_or("GITHUB_TIMEOUT_SECS", "30")
                    .parse()
                    .context("Invalid GITHUB_TIMEOUT_SECS value")?,
            },
            policy: PolicyConfig {
                allowed_users: parse_list(&env_var_or("ALLOWED_USERS", "")),
                allowed_orgs: parse_list(&env_var_or("ALLOWED_ORGS", "")),
                allowed_teams: parse_list(&env_var_or("ALLOWED_TEAMS", "")),
            },
            static_clients: parse_static_clients(&env_var_or("STATIC_CLIENTS", "[]"))?,
            session: SessionConfig {
                keepalive_secs: env_var_or("SESSION_KEEPALIVE_SECS", "30")
                    .parse()
                    .context("Invalid SESSION_KEEPALIVE_SECS value")?,
                push_queue_capacity: env_var_or("SESSION_PUSH_QUEUE_CAPACITY", "10")
                    .parse()
                    .context("Invalid SESSION_PUSH_QUEUE_CAPACITY value")?,
            },
        })
    }

    /// Validate configuration completeness before serving
    ///
    /// # Errors
    ///
    /// Returns an error if upstream credentials are missing
    pub fn validate(&self) -> Result<()> {
        if self.upstream.client_id.is_empty() {
            anyhow::bail!("GITHUB_CLIENT_ID (or GITHUB_CLIENT_ID_FILE) is required");
        }
        if self.upstream.client_secret.is_empty() {
            anyhow::bail!("GITHUB_CLIENT_SECRET (or GITHUB_CLIENT_SECRET_FILE) is required");
        }
        Ok(())
    }

    /// Human-readable configuration summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Gatehouse MCP Server Configuration:\n\
             - Listen: {}:{}\n\
             - Issuer: {}\n\
             - Database: {}\n\
             - Upstream: {}\n\
             - Allowlist: {}\n\
             - Static clients: {}",
            self.http_host,
            self.http_port,
            self.issuer_url,
            self.database_url,
            self.upstream.api_base_url,
            if self.policy.is_empty() {
                "open (everyone allowed)".to_owned()
            } else {
                format!(
                    "{} users, {} orgs, {} teams",
                    self.policy.allowed_users.len(),
                    self.policy.allowed_orgs.len(),
                    self.policy.allowed_teams.len()
                )
            },
            self.static_clients.len()
        )
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Read a secret from `<KEY>` or, failing that, from the file named by
/// `<KEY>_FILE`
fn secret_var(key: &str) -> Result<Option<String>> {
    if let Ok(value) = env::var(key) {
        if !value.is_empty() {
            return Ok(Some(value));
        }
    }
    let file_key = format!("{key}_FILE");
    if let Ok(path) = env::var(&file_key) {
        let contents =
            fs::read_to_string(&path).with_context(|| format!("failed to read {file_key}"))?;
        return Ok(Some(contents.trim().to_owned()));
    }
    Ok(None)
}

/// Parse a comma-separated list, trimming whitespace and dropping empties
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_static_clients(raw: &str) -> Result<Vec<StaticClientConfig>> {
    serde_json::from_str(raw).context("STATIC_CLIENTS must be a JSON array of client objects")
}
