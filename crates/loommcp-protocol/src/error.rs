//! Unified error taxonomy.
//!
//! Four families, mirroring where a failure originates: transport,
//! protocol (framing/validation), request (per-call outcome), and tool
//! (surfaced as `isError = true` results rather than JSON-RPC errors).
//! Error messages never reflect raw peer input.

use thiserror::Error;

use crate::codec::ParseErrorCode;
use crate::jsonrpc::{JsonRpcError, JsonRpcErrorCode};

/// Result alias for protocol-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the message fabric
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The transport is disconnected
    #[error("transport disconnected")]
    Disconnected,

    /// A send could not be enqueued on the transport
    #[error("transport send failed: {0}")]
    SendFailed(String),

    /// The peer closed the stream
    #[error("end of stream")]
    Eof,

    /// An inbound frame failed JSON-RPC validation
    #[error("protocol error: {}", .0.description())]
    Parse(ParseErrorCode),

    /// The requested method has no registered handler
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Request parameters failed structural validation
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// An internal failure while servicing a request
    #[error("internal error: {0}")]
    Internal(String),

    /// The request's deadline elapsed before a response arrived
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled before completion
    #[error("request cancelled")]
    Cancelled,

    /// The session was torn down while the request was in flight
    #[error("session shut down")]
    Shutdown,

    /// The peer answered with a JSON-RPC error object
    #[error("peer error {code}: {message}")]
    Peer {
        /// JSON-RPC error code from the peer
        code: i32,
        /// Error message from the peer
        message: String,
    },

    /// Handshake failed: protocol versions did not match exactly
    #[error("protocol version mismatch: ours {ours}, peer offered {theirs}")]
    VersionMismatch {
        /// The version this library speaks
        ours: String,
        /// The version the peer offered
        theirs: String,
    },

    /// The sampling tool-use loop exhausted its iteration or time budget
    #[error("sampling loop overflow after {iterations} iterations")]
    SamplingLoopOverflow {
        /// Iterations completed before giving up
        iterations: usize,
    },

    /// Serialization of an outbound payload failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// Map this error to the JSON-RPC code used when answering the peer
    pub fn jsonrpc_code(&self) -> JsonRpcErrorCode {
        match self {
            Self::Parse(ParseErrorCode::MalformedJson) => JsonRpcErrorCode::ParseError,
            Self::Parse(_) => JsonRpcErrorCode::InvalidRequest,
            Self::MethodNotFound(_) => JsonRpcErrorCode::MethodNotFound,
            Self::InvalidParams(_) | Self::VersionMismatch { .. } => JsonRpcErrorCode::InvalidParams,
            Self::Peer { code, .. } => JsonRpcErrorCode::from(*code),
            _ => JsonRpcErrorCode::InternalError,
        }
    }

    /// Build the JSON-RPC error object sent to the peer for this error
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        let code = self.jsonrpc_code();
        match self {
            // Parse errors keep the standard message; the description names
            // the violated rule without echoing input.
            Self::Parse(parse) => JsonRpcError {
                code: code.code(),
                message: parse.description().to_string(),
                data: None,
            },
            other => JsonRpcError::with_message(code, other.to_string()),
        }
    }

    /// Whether this error ends the whole session rather than one request
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Eof | Self::Shutdown)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<crate::codec::DecodeError> for Error {
    fn from(err: crate::codec::DecodeError) -> Self {
        Self::Parse(err.code)
    }
}
