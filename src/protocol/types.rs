//! MCP protocol type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Latest MCP protocol version supported by this server
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// All protocol versions this server speaks, newest first
pub const SUPPORTED_VERSIONS: &[&str] = &["2024-11-05", "2024-10-07"];

/// Negotiate to the client's requested version when supported, otherwise
/// fall back to the latest version this server speaks
#[must_use]
pub fn negotiate_version(client_version: &str) -> &'static str {
    SUPPORTED_VERSIONS
        .iter()
        .find(|v| **v == client_version)
        .copied()
        .unwrap_or(PROTOCOL_VERSION)
}

/// Tool definition as projected into `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (1-128 chars, [a-zA-Z0-9_.-])
    pub name: String,
    /// Tool description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input JSON Schema
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Content item in a tool call response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// Text value
        text: String,
    },
}

/// Server capabilities advertised from `initialize`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tools capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Tools capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether the server emits `tools/list_changed` notifications
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Implementation info (client or server)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    /// Implementation name
    pub name: String,
    /// Implementation version
    #[serde(default)]
    pub version: String,
}
