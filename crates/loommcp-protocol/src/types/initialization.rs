//! Initialize handshake types.

use serde::{Deserialize, Serialize};

use super::core::Implementation;
use crate::capabilities::{ClientCapabilities, ServerCapabilities};

/// `initialize` request parameters (client -> server)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Protocol version the client speaks; matched exactly
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Capabilities the client offers
    pub capabilities: ClientCapabilities,
    /// Client identity
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// `initialize` result (server -> client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the server speaks; matched exactly
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Capabilities the server offers
    pub capabilities: ServerCapabilities,
    /// Server identity
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    /// Usage instructions the server wants surfaced to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}
