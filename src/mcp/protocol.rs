// ABOUTME: JSON-RPC 2.0 envelope and MCP protocol wire types
// ABOUTME: Requests, responses, errors and the initialize/tools result shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version
pub const JSONRPC_VERSION: &str = "2.0";
/// MCP protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC parse error code
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC method-not-found error code
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC internal error code
pub const INTERNAL_ERROR: i64 = -32603;

/// An incoming JSON-RPC request or notification
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, expected to be "2.0"
    #[serde(default)]
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Option<Value>,
    /// Request id; absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Notifications carry no id and get no response
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An outgoing JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Id of the request being answered; null for parse errors
    pub id: Option<Value>,
    /// Result payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response
    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    #[must_use]
    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
}

/// Result of the `initialize` method
#[derive(Debug, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol revision the server speaks
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Server identity
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Capabilities advertised at initialize time
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool support marker
    pub tools: Value,
}

/// Server name and version
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

/// Result of `tools/list`
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// Registered tool definitions
    pub tools: Vec<super::tools::ToolDefinition>,
}

/// Parameters of `tools/call`
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// Tool name
    pub name: String,
    /// Tool arguments, shape defined per tool
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One content item in a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    /// Content type, currently always "text"
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text payload
    pub text: String,
}

impl ToolContent {
    /// Text content item
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_owned(),
            text: text.into(),
        }
    }
}

/// Result of a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Content items produced by the tool
    pub content: Vec<ToolContent>,
    /// Whether the content describes a tool-level failure
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not", default)]
    pub is_error: bool,
}
