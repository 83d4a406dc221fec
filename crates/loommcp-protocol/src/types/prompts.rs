//! Prompt definitions and the `prompts/*` request/result surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::content::ContentBlock;
use super::core::Role;

/// An argument a prompt accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether callers must supply this argument
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

/// A prompt template the server exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Prompt name, unique within the server
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments this prompt accepts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// One message of a rendered prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// The speaking role
    pub role: Role,
    /// Message content
    pub content: ContentBlock,
}

/// `prompts/list` request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPromptsParams {
    /// Opaque pagination cursor from a previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `prompts/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Prompts on this page
    pub prompts: Vec<Prompt>,
    /// Cursor for the next page; absent on the last page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Total number of prompts, if the server chooses to report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

/// `prompts/get` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    /// Name of the prompt to render
    pub name: String,
    /// Raw argument values keyed by argument name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// `prompts/get` result: an ordered message list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Human-readable description of the rendered prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered messages, in order
    pub messages: Vec<PromptMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_flag_defaults_false() {
        let arg: PromptArgument =
            serde_json::from_str(r#"{"name": "topic"}"#).unwrap();
        assert!(!arg.required);
    }
}
