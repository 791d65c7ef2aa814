// ABOUTME: MCP protocol layer: JSON-RPC envelope, method router and tool registry
// ABOUTME: Thin dispatch for initialize, tools/list and tools/call over any transport
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

/// JSON-RPC 2.0 envelope and MCP wire types
pub mod protocol;
/// Method router
pub mod server;
/// Tool trait and registry
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
pub use tools::{CurrentDateTool, Tool, ToolDefinition, ToolRegistry};
