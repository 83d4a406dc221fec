//! Tool definitions and the `tools/*` request/result surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::ContentBlock;
use super::core::Meta;

/// Behavioral hints about a tool, advisory only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// Display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Hint that the tool does not modify its environment
    #[serde(rename = "readOnlyHint", skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// Hint that the tool may perform destructive updates
    #[serde(rename = "destructiveHint", skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// Hint that repeated calls with the same arguments have no extra effect
    #[serde(rename = "idempotentHint", skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    /// Hint that the tool interacts with an open world of entities
    #[serde(rename = "openWorldHint", skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// A tool the server exposes for invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name, unique within the server
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the accepted arguments object
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// JSON Schema describing `structuredContent` in results
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Advisory annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
    /// General metadata field for extensions
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// `tools/list` request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListToolsParams {
    /// Opaque pagination cursor from a previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools on this page
    pub tools: Vec<Tool>,
    /// Cursor for the next page; absent on the last page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Total number of tools, if the server chooses to report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

/// `tools/call` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments object validated against the tool's input schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `tools/call` result
///
/// Tool failures travel here with `is_error = true`; JSON-RPC errors are
/// reserved for protocol-level failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Result content blocks
    pub content: Vec<ContentBlock>,
    /// True when the tool failed
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    /// Structured result matching the tool's output schema
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Successful result with a single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
            structured_content: None,
        }
    }

    /// Failed result with a single text block describing the problem
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
            structured_content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_result_error_shape() {
        let result = CallToolResult::error("unknown tool: frobnicate");
        let raw = serde_json::to_value(&result).unwrap();
        assert_eq!(raw["isError"], json!(true));
        assert_eq!(raw["content"][0]["type"], "text");
    }

    #[test]
    fn list_result_omits_next_cursor_when_done() {
        let result = ListToolsResult {
            tools: vec![],
            next_cursor: None,
            total: Some(0),
        };
        let raw = serde_json::to_value(&result).unwrap();
        assert!(raw.get("nextCursor").is_none());
    }
}
