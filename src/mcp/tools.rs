// ABOUTME: Tool trait, registry and the built-in current_date tool
// ABOUTME: Tools are registered at startup and invoked by name through tools/call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

use super::protocol::{ToolCallResult, ToolContent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// MCP tool definition as advertised by `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within a registry
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema of the tool's arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// An invocable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to clients
    fn definition(&self) -> ToolDefinition;

    /// Invoke the tool with the given arguments
    async fn call(&self, arguments: Value) -> Result<ToolCallResult>;
}

/// Registry of tools available to a server instance
#[derive(Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Later registrations under the same name win.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let definition = tool.definition();
        self.definitions.retain(|d| d.name != definition.name);
        self.tools.insert(definition.name.clone(), tool);
        self.definitions.push(definition);
    }

    /// Definitions of all registered tools
    #[must_use]
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }

    /// Invoke a tool by name
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tool names or a failing invocation
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("tool not found: {name}"))?;
        tool.call(arguments).await
    }
}

/// Built-in tool returning the current date and time in UTC
pub struct CurrentDateTool;

#[async_trait]
impl Tool for CurrentDateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "current_date".to_owned(),
            description: "Returns the current date and time in UTC".to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {},
            }),
        }
    }

    async fn call(&self, _arguments: Value) -> Result<ToolCallResult> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        Ok(ToolCallResult {
            content: vec![ToolContent::text(now)],
            is_error: false,
        })
    }
}
