// ABOUTME: Main library entry point for the Gatehouse MCP server
// ABOUTME: OAuth 2.1 authorization server and session-coordinated MCP transport
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

#![deny(unsafe_code)]

//! # Gatehouse MCP Server
//!
//! An embeddable OAuth 2.1 authorization server fronting a single upstream
//! identity provider (GitHub), combined with a session-coordinated streamable
//! HTTP transport for MCP tool traffic.
//!
//! ## Architecture
//!
//! - **`oauth2_server`**: the protocol surface — discovery metadata, RFC 7591
//!   dynamic registration, the PKCE-mandatory authorization-code flow with
//!   upstream federation, token issuance with refresh rotation, and static
//!   client administration
//! - **`upstream`**: the GitHub wire-protocol client and the user/org/team
//!   allowlist policy
//! - **`store`**: pluggable persistence behind the [`store::AuthStore`] trait
//!   with an embedded sled backend and secondary indices
//! - **`middleware`**: bearer authentication resolving tokens to principals
//! - **`session`** / **`transport`**: the session manager and the `/mcp`
//!   streamable HTTP endpoint with its SSE push channel
//! - **`mcp`**: the thin JSON-RPC method router and tool registry

/// Configuration management from environment variables
pub mod config;

/// Unified error types and HTTP status mapping
pub mod errors;

/// Structured logging initialization
pub mod logging;

/// MCP protocol router and tools
pub mod mcp;

/// Bearer authentication middleware
pub mod middleware;

/// Domain entities persisted in the store
pub mod models;

/// OAuth 2.1 authorization server
pub mod oauth2_server;

/// Session manager binding principals to push channels
pub mod session;

/// Persistent store trait and backends
pub mod store;

/// Streamable HTTP transport for MCP traffic
pub mod transport;

/// Upstream identity provider integration
pub mod upstream;
