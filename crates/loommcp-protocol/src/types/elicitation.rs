//! Elicitation (`elicitation/create`) request/result surface.
//!
//! Two modes: *form* (the client renders a flat primitive form and answers
//! synchronously) and *url* (the client opens a URL, answers `pending`, and
//! the terminal result arrives later via
//! `notifications/elicitation/complete`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Action taken by the user on an elicitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElicitationAction {
    /// User submitted the form / confirmed the action
    Accept,
    /// User explicitly declined
    Decline,
    /// User dismissed without an explicit choice
    Cancel,
    /// URL mode only: the flow continues out of band
    Pending,
}

/// Primitive field schema for form-mode elicitation
///
/// Only flat primitives are allowed; nested objects are rejected at the
/// type level by this enum having no object variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PrimitiveSchema {
    /// Free-form string field
    String {
        /// Field description shown to the user
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Default value
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        /// Restrict input to one of these values
        #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    /// Floating-point field
    Number {
        /// Field description shown to the user
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Default value
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<f64>,
        /// Inclusive minimum
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        /// Inclusive maximum
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    /// Integer field
    Integer {
        /// Field description shown to the user
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Default value
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<i64>,
        /// Inclusive minimum
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        /// Inclusive maximum
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    /// Boolean field
    Boolean {
        /// Field description shown to the user
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Default value
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<bool>,
    },
    /// Array of one primitive item type
    Array {
        /// Field description shown to the user
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Item schema; must itself be primitive
        items: Box<PrimitiveSchema>,
    },
}

/// Form schema: flat object of primitive properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationSchema {
    /// Always the string `"object"`
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Field schemas keyed by property name
    pub properties: HashMap<String, PrimitiveSchema>,
    /// Names of required properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ElicitationSchema {
    /// Create an empty object schema
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: None,
        }
    }
}

impl Default for ElicitationSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// `elicitation/create` parameters, distinguishing form and URL modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElicitParams {
    /// URL mode: open a URL and complete out of band
    Url(UrlElicitParams),
    /// Form mode: render a flat form and answer synchronously
    Form(FormElicitParams),
}

/// Form-mode parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormElicitParams {
    /// What the server is asking for
    pub message: String,
    /// The form's flat primitive schema
    #[serde(rename = "requestedSchema")]
    pub requested_schema: ElicitationSchema,
}

/// URL-mode parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlElicitParams {
    /// What the server is asking for
    pub message: String,
    /// Identifier correlating the later completion notification
    #[serde(rename = "elicitationId")]
    pub elicitation_id: String,
    /// The URL the client should open
    pub url: String,
}

/// `elicitation/create` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitResult {
    /// The action the user took (or `pending` in URL mode)
    pub action: ElicitationAction,
    /// Submitted form values, present when `action` is `accept`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, Value>>,
}

impl ElicitResult {
    /// An accept result carrying form values
    pub fn accept(content: HashMap<String, Value>) -> Self {
        Self {
            action: ElicitationAction::Accept,
            content: Some(content),
        }
    }

    /// A decline result
    pub fn decline() -> Self {
        Self {
            action: ElicitationAction::Decline,
            content: None,
        }
    }

    /// A cancel result
    pub fn cancel() -> Self {
        Self {
            action: ElicitationAction::Cancel,
            content: None,
        }
    }

    /// The immediate URL-mode answer
    pub fn pending() -> Self {
        Self {
            action: ElicitationAction::Pending,
            content: None,
        }
    }
}

/// `notifications/elicitation/complete` parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationCompleteParams {
    /// The elicitation this notification completes
    #[serde(rename = "elicitationId")]
    pub elicitation_id: String,
    /// Terminal result of the out-of-band flow
    pub result: ElicitResult,
}
