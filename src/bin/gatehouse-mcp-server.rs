// ABOUTME: Server binary wiring configuration, store, OAuth server and transport
// ABOUTME: Starts the warp HTTP server carrying auth, admin and MCP routes

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! # Gatehouse MCP Server Binary
//!
//! Starts the OAuth 2.1 authorization server and the session-coordinated
//! MCP transport on a single HTTP listener.

use anyhow::{Context, Result};
use clap::Parser;
use gatehouse_mcp_server::{
    config::ServerConfig,
    logging,
    mcp::{CurrentDateTool, McpServer, ToolRegistry},
    middleware::BearerAuthMiddleware,
    oauth2_server::{oauth2_routes, AdminService, AuthorizationServer},
    session::SessionManager,
    store::{AuthStore, Store},
    transport::McpTransport,
    upstream::{AllowlistPolicy, GitHubClient},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use warp::Filter;

#[derive(Parser)]
#[command(name = "gatehouse-mcp-server")]
#[command(about = "OAuth 2.1 authorization server and MCP transport")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    config.validate()?;

    logging::init_from_env()?;
    info!("Starting Gatehouse MCP server");
    info!("{}", config.summary());

    let store = Arc::new(Store::new(&config.database_url)?);
    info!("Store initialized: {}", store.backend_info());

    let upstream = Arc::new(GitHubClient::new(
        config.upstream.clone(),
        format!("{}/callback", config.issuer_url),
    )?);
    let policy = AllowlistPolicy::new(config.policy.clone());

    let auth_server = Arc::new(AuthorizationServer::new(
        config.issuer_url.clone(),
        Arc::clone(&store),
        upstream,
        policy,
    ));
    auth_server
        .seed_static_clients(&config.static_clients)
        .await?;

    let admin = Arc::new(AdminService::new(Arc::clone(&store)));
    let bearer = BearerAuthMiddleware::new(Arc::clone(&store));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CurrentDateTool));
    let mcp = Arc::new(McpServer::new(
        registry,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    ));

    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&store),
        config.session.clone(),
    ));
    let transport = Arc::new(McpTransport::new(
        mcp,
        sessions,
        bearer.clone(),
        config.issuer_url.clone(),
    ));

    let routes = oauth2_routes(&auth_server, &admin, &bearer)
        .or(McpTransport::routes(&transport))
        .unify()
        .with(warp::trace::request());

    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .context("invalid HTTP listen address")?;
    info!("HTTP server listening on {addr}");

    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        if tokio::signal::ctrl_c().await.is_err() {
            info!("Shutdown signal listener failed, exiting");
        }
        info!("Shutdown signal received");
    });
    server.await;

    store.close().await?;
    info!("Server stopped");
    Ok(())
}
