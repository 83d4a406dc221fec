//! Capability negotiation structures.
//!
//! Exchanged once during the initialize handshake. Each feature family's
//! owner advertises its `listChanged` bit here (the client for roots, the
//! server for tools, resources, and prompts), and the owning session wires
//! a family's list-changed callback only when its bit is set. The check
//! helpers below are the one place those bits are read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Capabilities the client advertises
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Open extension namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
    /// The client exposes filesystem-like roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    /// The client can service `sampling/createMessage`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    /// The client can service `elicitation/create`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,
}

/// Capabilities the server advertises
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Open extension namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, Value>>,
    /// The server emits log notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    /// The server exposes prompts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// The server exposes resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// The server exposes tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Roots sub-capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsCapability {
    /// The client notifies when its root set changes
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Sampling sub-capability (presence is the signal; no parameters yet)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingCapability {}

/// Elicitation sub-capability (presence is the signal; no parameters yet)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElicitationCapability {}

/// Logging sub-capability (presence is the signal; no parameters yet)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingCapability {}

/// Prompts sub-capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptsCapability {
    /// The server notifies when its prompt set changes
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources sub-capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// The server accepts per-resource subscriptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// The server notifies when its resource set changes
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tools sub-capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// The server notifies when its tool set changes
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ClientCapabilities {
    /// Start building client capabilities fluently
    pub fn builder() -> ClientCapabilitiesBuilder {
        ClientCapabilitiesBuilder::default()
    }

    /// Whether roots list-changed notifications were advertised
    pub fn wants_roots_list_changed(&self) -> bool {
        self.roots
            .as_ref()
            .and_then(|r| r.list_changed)
            .unwrap_or(false)
    }

    /// Whether the client can service sampling requests
    pub fn supports_sampling(&self) -> bool {
        self.sampling.is_some()
    }

    /// Whether the client can service elicitation requests
    pub fn supports_elicitation(&self) -> bool {
        self.elicitation.is_some()
    }
}

impl ServerCapabilities {
    /// Whether `notifications/tools/list_changed` was advertised
    pub fn wants_tools_list_changed(&self) -> bool {
        self.tools
            .as_ref()
            .and_then(|t| t.list_changed)
            .unwrap_or(false)
    }

    /// Whether `notifications/resources/list_changed` was advertised
    pub fn wants_resources_list_changed(&self) -> bool {
        self.resources
            .as_ref()
            .and_then(|r| r.list_changed)
            .unwrap_or(false)
    }

    /// Whether `notifications/prompts/list_changed` was advertised
    pub fn wants_prompts_list_changed(&self) -> bool {
        self.prompts
            .as_ref()
            .and_then(|p| p.list_changed)
            .unwrap_or(false)
    }
}

/// Fluent builder for [`ClientCapabilities`]
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilitiesBuilder {
    capabilities: ClientCapabilities,
}

impl ClientCapabilitiesBuilder {
    /// Advertise roots support
    pub fn with_roots(mut self, list_changed: bool) -> Self {
        self.capabilities.roots = Some(RootsCapability {
            list_changed: Some(list_changed),
        });
        self
    }

    /// Advertise sampling support
    pub fn with_sampling(mut self) -> Self {
        self.capabilities.sampling = Some(SamplingCapability {});
        self
    }

    /// Advertise elicitation support
    pub fn with_elicitation(mut self) -> Self {
        self.capabilities.elicitation = Some(ElicitationCapability {});
        self
    }

    /// Attach an experimental capability under `key`
    pub fn with_experimental(mut self, key: impl Into<String>, value: Value) -> Self {
        self.capabilities
            .experimental
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Finish building
    pub fn build(self) -> ClientCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_composes() {
        let caps = ClientCapabilities::builder()
            .with_roots(true)
            .with_sampling()
            .with_experimental("tasks", json!({"enabled": true}))
            .build();

        assert!(caps.wants_roots_list_changed());
        assert!(caps.supports_sampling());
        assert!(!caps.supports_elicitation());
        assert_eq!(caps.experimental.unwrap()["tasks"], json!({"enabled": true}));
    }

    #[test]
    fn list_changed_defaults_to_false() {
        let caps = ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: None }),
            ..Default::default()
        };
        assert!(!caps.wants_tools_list_changed());
        assert!(!caps.wants_resources_list_changed());
    }

    #[test]
    fn empty_capabilities_serialize_empty() {
        let caps = ClientCapabilities::default();
        assert_eq!(serde_json::to_value(&caps).unwrap(), json!({}));
    }
}
