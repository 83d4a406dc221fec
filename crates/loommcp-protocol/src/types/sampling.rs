//! Sampling (`sampling/createMessage`) request/result surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::ContentBlock;
use super::core::Role;
use super::tools::Tool;

/// One message in a sampling conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// The speaking role
    pub role: Role,
    /// Message content
    pub content: ContentBlock,
}

impl SamplingMessage {
    /// Build a user message with a single content block
    pub fn user(content: ContentBlock) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// Build an assistant message with a single content block
    pub fn assistant(content: ContentBlock) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }
}

/// A hint naming a preferred model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHint {
    /// Substring matched against model names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Preferences guiding model selection on the client side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPreferences {
    /// Ordered model hints, most preferred first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    /// Relative weight for cost, in [0, 1]
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// Relative weight for speed, in [0, 1]
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// Relative weight for intelligence, in [0, 1]
    #[serde(rename = "intelligencePriority", skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

/// `sampling/createMessage` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageParams {
    /// Conversation so far
    pub messages: Vec<SamplingMessage>,
    /// Model selection preferences
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// System prompt the server suggests
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum tokens to sample
    #[serde(rename = "maxTokens")]
    pub max_tokens: u64,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Tools the model may invoke during this exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Provider-specific metadata passthrough
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Why the model stopped sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Generation completed naturally
    EndTurn,
    /// The token budget was exhausted
    MaxTokens,
    /// A configured stop sequence was hit
    StopSequence,
    /// Content filtering triggered
    ContentFilter,
    /// The model wants tool results before continuing
    ToolUse,
}

/// `sampling/createMessage` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// The role of the sampled message (always assistant in practice)
    pub role: Role,
    /// Sampled content
    pub content: Vec<ContentBlock>,
    /// Name of the model that produced the message
    pub model: String,
    /// Why sampling stopped
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl CreateMessageResult {
    /// All tool uses requested in this result, in order
    pub fn tool_uses(&self) -> Vec<&super::content::ToolUseContent> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(tool_use) => Some(tool_use),
                _ => None,
            })
            .collect()
    }

    /// Whether the model is waiting on tool results
    pub fn wants_tool_use(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse) || !self.tool_uses().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stop_reason_serde() {
        assert_eq!(
            serde_json::to_value(StopReason::ToolUse).unwrap(),
            json!("toolUse")
        );
        assert_eq!(
            serde_json::to_value(StopReason::ContentFilter).unwrap(),
            json!("contentFilter")
        );
        let parsed: StopReason = serde_json::from_value(json!("endTurn")).unwrap();
        assert_eq!(parsed, StopReason::EndTurn);
    }

    #[test]
    fn wants_tool_use_detection() {
        let plain = CreateMessageResult {
            role: Role::Assistant,
            content: vec![ContentBlock::text("done")],
            model: "m".into(),
            stop_reason: Some(StopReason::EndTurn),
        };
        assert!(!plain.wants_tool_use());

        let with_use = CreateMessageResult {
            role: Role::Assistant,
            content: vec![ContentBlock::ToolUse(super::super::content::ToolUseContent {
                id: "u1".into(),
                name: "echo".into(),
                input: json!({}),
            })],
            model: "m".into(),
            stop_reason: Some(StopReason::ToolUse),
        };
        assert!(with_use.wants_tool_use());
        assert_eq!(with_use.tool_uses().len(), 1);
    }
}
