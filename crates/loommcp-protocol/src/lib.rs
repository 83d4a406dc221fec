//! # loommcp-protocol
//!
//! Protocol layer of the loommcp message fabric: JSON-RPC 2.0 message types
//! and wire codec, the MCP data model (content blocks, tools, resources,
//! prompts, sampling, elicitation, tasks, roots), capability negotiation,
//! pagination primitives, and the unified error taxonomy.
//!
//! The crates above this one (`loommcp-core`, `loommcp-transport`,
//! `loommcp-server`, `loommcp-client`) speak exclusively in these types.

#![warn(missing_docs)]

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod pagination;
pub mod types;

pub use error::{Error, Result};
pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, ResponseId,
};

/// The protocol revision this library speaks; negotiated by exact match
pub const PROTOCOL_VERSION: &str = "2025-11-25";

/// Upper bound on a single wire frame, in bytes
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
