//! Resource definitions and the `resources/*` request/result surface.

use serde::{Deserialize, Serialize};

use super::content::ResourceContents;
use super::core::{Annotations, Meta};

/// A concrete resource the server can serve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The URI of this resource
    pub uri: String,
    /// Resource name (programmatic identifier)
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The MIME type of this resource, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Optional annotations for the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    /// General metadata field for extensions
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A parameterized resource family addressed by URI template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// RFC 6570 URI template (Level 1-2)
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    /// Template name (programmatic identifier)
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The MIME type of resources produced by this template, if uniform
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// `resources/list` request parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResourcesParams {
    /// Opaque pagination cursor from a previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `resources/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Resources on this page
    pub resources: Vec<Resource>,
    /// Cursor for the next page; absent on the last page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Total number of resources, if the server chooses to report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

/// `resources/templates/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// Templates on this page
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
    /// Cursor for the next page; absent on the last page
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/read` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// The URI of the resource to read
    pub uri: String,
}

/// `resources/read` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// One or more content entries (text or base64 blob plus MIME type)
    pub contents: Vec<ResourceContents>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_serde_shape() {
        let res = Resource {
            uri: "file:///notes.txt".into(),
            name: "notes".into(),
            description: None,
            mime_type: Some("text/plain".into()),
            annotations: None,
            meta: None,
        };
        let raw = serde_json::to_value(&res).unwrap();
        assert_eq!(raw["mimeType"], json!("text/plain"));
        assert!(raw.get("description").is_none());
    }
}
