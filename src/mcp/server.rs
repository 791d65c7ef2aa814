// ABOUTME: MCP method router dispatching initialize, tools/list and tools/call
// ABOUTME: Notifications get no response; unknown methods get method-not-found
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

use super::protocol::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    ToolCallParams, ToolsListResult, INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION,
};
use super::tools::ToolRegistry;
use serde_json::{json, Value};
use tracing::debug;

/// The MCP protocol server: routes JSON-RPC messages to handlers
pub struct McpServer {
    registry: ToolRegistry,
    name: String,
    version: String,
}

impl McpServer {
    /// Create a server over a tool registry
    #[must_use]
    pub fn new(registry: ToolRegistry, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Process one raw JSON-RPC message. Returns `None` for notifications,
    /// which get no response body.
    pub async fn handle_message(&self, raw: &[u8]) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_slice(raw) {
            Ok(request) => request,
            Err(e) => {
                debug!("JSON-RPC parse error: {e}");
                return Some(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error"));
            }
        };

        debug!(method = %request.method, "JSON-RPC request");

        if request.is_notification() {
            // notifications/initialized and friends need no action here
            return None;
        }

        let id = request.id.clone();
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result()),
            "tools/list" => {
                let result = ToolsListResult {
                    tools: self.registry.list(),
                };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
                }
            }
            "tools/call" => self.tools_call(id, request.params).await,
            other => {
                debug!(method = %other, "JSON-RPC method not found");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, "Method not found")
            }
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        serde_json::to_value(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            capabilities: ServerCapabilities { tools: json!({}) },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
        })
        .unwrap_or(Value::Null)
    }

    async fn tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) | Err(_) => {
                return JsonRpcResponse::error(id, INTERNAL_ERROR, "invalid tools/call params");
            }
        };

        match self
            .registry
            .call(&params.name, params.arguments.unwrap_or(Value::Null))
            .await
        {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
            },
            Err(e) => {
                debug!(tool = %params.name, "Tool call failed: {e}");
                JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string())
            }
        }
    }
}
