//! Shared primitive types used across the protocol surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Open metadata bag carried in `_meta` members
pub type Meta = HashMap<String, Value>;

/// Opaque progress token correlated through `params._meta.progressToken`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String token
    String(String),
    /// Integer token
    Number(i64),
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Name and version of an MCP implementation, exchanged during initialize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name (programmatic identifier)
    pub name: String,
    /// Implementation version
    pub version: String,
    /// Display title for UI contexts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    /// Create an implementation descriptor
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

/// Message sender role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human or calling application
    User,
    /// Model output
    Assistant,
}

/// Annotations attached to content blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    /// Intended audience for this content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    /// Priority in [0, 1]; 1 means effectively required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// RFC 3339 timestamp of the last modification
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Progress notification parameters (`notifications/progress`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotificationParams {
    /// Token correlating this update to the originating request
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    /// Progress value, clamped by the sender to [0, 100]
    pub progress: f64,
    /// Optional human-readable status line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cancellation notification parameters (`notifications/cancelled`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledNotificationParams {
    /// ID of the request being cancelled
    #[serde(rename = "requestId")]
    pub request_id: crate::jsonrpc::RequestId,
    /// Optional reason string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Extract `params._meta.progressToken` from raw request params
pub fn progress_token_from_params(params: Option<&Value>) -> Option<ProgressToken> {
    let meta = params?.get("_meta")?;
    serde_json::from_value(meta.get("progressToken")?.clone()).ok()
}
