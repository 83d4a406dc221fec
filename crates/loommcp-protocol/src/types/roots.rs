//! Root boundaries advertised by the client (`roots/list`).

use serde::{Deserialize, Serialize};

/// A URI boundary the client exposes to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Root URI, usually a `file://` location
    pub uri: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `roots/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// All roots the client currently exposes
    pub roots: Vec<Root>,
}
