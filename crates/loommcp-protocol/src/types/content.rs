//! Message content types.
//!
//! Tagged content blocks for rich message composition: text, binary media,
//! resource references, and the tool-use / tool-result pair threaded through
//! sampling conversations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::core::{Annotations, Meta};

/// Content block union, tagged by the `type` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Text content
    #[serde(rename = "text")]
    Text(TextContent),
    /// Image content
    #[serde(rename = "image")]
    Image(ImageContent),
    /// Audio content
    #[serde(rename = "audio")]
    Audio(AudioContent),
    /// Resource link
    #[serde(rename = "resource_link")]
    ResourceLink(ResourceLink),
    /// Embedded resource
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
    /// Model-requested tool invocation
    #[serde(rename = "tool_use")]
    ToolUse(ToolUseContent),
    /// Result of a tool invocation, threaded back to the model
    #[serde(rename = "tool_result")]
    ToolResult(ToolResultContent),
}

impl ContentBlock {
    /// Shorthand for a plain text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent {
            text: text.into(),
            annotations: None,
            meta: None,
        })
    }
}

/// Text content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text of the message
    pub text: String,
    /// Optional annotations for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// General metadata field for extensions
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Base64-encoded image content; `data` and `mime_type` are both required
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// The base64-encoded image data
    pub data: String,
    /// The MIME type of the image
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Optional annotations for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// General metadata field for extensions
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Base64-encoded audio content; `data` and `mime_type` are both required
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioContent {
    /// The base64-encoded audio data
    pub data: String,
    /// The MIME type of the audio
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Optional annotations for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// General metadata field for extensions
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Reference to a resource the receiver can read later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    /// The URI of the resource
    pub uri: String,
    /// Resource name (programmatic identifier)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A description of what this resource represents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The MIME type of this resource, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Optional annotations for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Resource content carried inline in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The embedded resource content (text or binary)
    pub resource: ResourceContents,
    /// Optional annotations for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// General metadata field for extensions
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// The contents of a resource: text or base64 blob, plus identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    /// UTF-8 text resource
    Text(TextResourceContents),
    /// Binary resource, base64-encoded
    Blob(BlobResourceContents),
}

impl ResourceContents {
    /// The URI identifying this resource
    pub fn uri(&self) -> &str {
        match self {
            Self::Text(t) => &t.uri,
            Self::Blob(b) => &b.uri,
        }
    }
}

/// Text resource contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResourceContents {
    /// The URI of this resource
    pub uri: String,
    /// The text of the resource
    pub text: String,
    /// The MIME type of this resource, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Binary resource contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobResourceContents {
    /// The URI of this resource
    pub uri: String,
    /// Base64-encoded binary payload
    pub blob: String,
    /// The MIME type of this resource, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A tool invocation requested by the model during sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseContent {
    /// Identifier correlating this use with its result
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments for the tool, matching its input schema
    pub input: Value,
}

/// The outcome of a tool invocation, threaded back into the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultContent {
    /// The `id` of the tool use this result answers
    #[serde(rename = "toolUseId")]
    pub tool_use_id: String,
    /// Result content blocks
    pub content: Vec<ContentBlock>,
    /// True when the tool failed; the content then describes the failure
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_block_tagging() {
        let block = ContentBlock::text("hi");
        let raw = serde_json::to_value(&block).unwrap();
        assert_eq!(raw, json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn image_requires_data_and_mime() {
        let raw = json!({"type": "image", "data": "aGk=", "mimeType": "image/png"});
        let block: ContentBlock = serde_json::from_value(raw).unwrap();
        assert!(matches!(block, ContentBlock::Image(_)));

        // A media block without mimeType must not parse.
        let missing = json!({"type": "image", "data": "aGk="});
        assert!(serde_json::from_value::<ContentBlock>(missing).is_err());
    }

    #[test]
    fn resource_contents_untagged() {
        let text: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///a", "text": "abc"})).unwrap();
        assert!(matches!(text, ResourceContents::Text(_)));

        let blob: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///b", "blob": "aGk="})).unwrap();
        assert!(matches!(blob, ResourceContents::Blob(_)));
        assert_eq!(blob.uri(), "file:///b");
    }

    #[test]
    fn tool_use_round_trip() {
        let block = ContentBlock::ToolUse(ToolUseContent {
            id: "u1".into(),
            name: "echo".into(),
            input: json!({"message": "hi"}),
        });
        let raw = serde_json::to_value(&block).unwrap();
        assert_eq!(raw["type"], "tool_use");
        let back: ContentBlock = serde_json::from_value(raw).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn tool_result_is_error_default() {
        let raw = json!({
            "type": "tool_result",
            "toolUseId": "u1",
            "content": [{"type": "text", "text": "boom"}]
        });
        let block: ContentBlock = serde_json::from_value(raw).unwrap();
        match block {
            ContentBlock::ToolResult(r) => assert!(!r.is_error),
            other => panic!("expected tool_result, got {other:?}"),
        }
    }
}
