// ABOUTME: Transport layer carrying MCP protocol traffic over streamable HTTP
// ABOUTME: Binds bearer-authenticated requests to sessions and their push channels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

/// Streamable HTTP transport for the /mcp endpoint
pub mod http;

pub use http::McpTransport;
