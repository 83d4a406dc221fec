//! Wire codec: JSON-RPC 2.0 framing and validation.
//!
//! Encoders produce `Bytes`, optionally terminated by a newline for
//! line-framed transports. The decoder validates the JSON-RPC envelope
//! field by field so that malformed input maps to a precise
//! [`ParseErrorCode`], and recovers the request ID on a best-effort basis
//! so that error responses can carry the right `id`.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;

use crate::jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcVersion, RequestId, JSONRPC_VERSION,
};

/// Framing applied by the encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Raw JSON bytes, no terminator (HTTP bodies, SSE data lines)
    #[default]
    None,
    /// JSON bytes terminated by a single `\n` (stdio transport)
    Newline,
}

/// Fine-grained reason a frame failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorCode {
    /// The `jsonrpc` member is absent
    MissingJsonrpc,
    /// The `jsonrpc` member is present but is not the string `"2.0"`
    InvalidJsonrpcVersion,
    /// A response carried no `id` member
    MissingId,
    /// The `id` member is neither an integer nor a string
    InvalidIdType,
    /// A message with an `id` carried no `method` and no result/error
    MissingMethod,
    /// The `method` member is not a string
    InvalidMethodType,
    /// The `params` member is present but neither object nor array
    InvalidParamsType,
    /// The frame is not well-formed JSON, or result/error are malformed
    MalformedJson,
}

impl ParseErrorCode {
    /// Short stable description, safe to put in an error response
    ///
    /// Never reflects any bytes of the offending input.
    pub fn description(&self) -> &'static str {
        match self {
            Self::MissingJsonrpc => "missing jsonrpc member",
            Self::InvalidJsonrpcVersion => "jsonrpc member must be \"2.0\"",
            Self::MissingId => "missing id member",
            Self::InvalidIdType => "id must be an integer or a string",
            Self::MissingMethod => "missing method member",
            Self::InvalidMethodType => "method must be a string",
            Self::InvalidParamsType => "params must be an object or an array",
            Self::MalformedJson => "malformed JSON",
        }
    }
}

/// A decode failure, carrying whatever request ID could be recovered
///
/// The recovered ID lets the session answer a broken request with an error
/// response addressed to the right `id`; it is `None` only when even the ID
/// could not be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// Why the frame was rejected
    pub code: ParseErrorCode,
    /// Request ID recovered from the malformed frame, if any
    pub recovered_id: Option<RequestId>,
}

impl DecodeError {
    fn new(code: ParseErrorCode, recovered_id: Option<RequestId>) -> Self {
        Self { code, recovered_id }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decode error: {}", self.code.description())
    }
}

impl std::error::Error for DecodeError {}

/// Encode a request, appending a newline when `framing` asks for one
///
/// # Panics
///
/// Never panics: the message types in this crate always serialize.
pub fn encode_request(request: &JsonRpcRequest, framing: Framing) -> Bytes {
    frame(
        serde_json::to_vec(request).expect("request serialization is infallible"),
        framing,
    )
}

/// Encode a successful response
pub fn encode_response_ok(id: RequestId, result: Value, framing: Framing) -> Bytes {
    let response = JsonRpcResponse::success(id, result);
    frame(
        serde_json::to_vec(&response).expect("response serialization is infallible"),
        framing,
    )
}

/// Encode an error response; `id` is `None` for unrecoverable parse errors
pub fn encode_response_err(id: Option<RequestId>, error: JsonRpcError, framing: Framing) -> Bytes {
    let response = JsonRpcResponse::error_with_optional_id(id, error);
    frame(
        serde_json::to_vec(&response).expect("response serialization is infallible"),
        framing,
    )
}

/// Encode a notification
pub fn encode_notification(notification: &JsonRpcNotification, framing: Framing) -> Bytes {
    frame(
        serde_json::to_vec(notification).expect("notification serialization is infallible"),
        framing,
    )
}

/// Encode an already-assembled message
pub fn encode_message(message: &JsonRpcMessage, framing: Framing) -> Bytes {
    frame(
        serde_json::to_vec(message).expect("message serialization is infallible"),
        framing,
    )
}

fn frame(encoded: Vec<u8>, framing: Framing) -> Bytes {
    match framing {
        Framing::None => Bytes::from(encoded),
        Framing::Newline => {
            let mut buf = BytesMut::with_capacity(encoded.len() + 1);
            buf.put_slice(&encoded);
            buf.put_u8(b'\n');
            buf.freeze()
        }
    }
}

/// Decode and validate a single JSON-RPC frame
///
/// Classifies the frame as request, response, or notification, enforcing:
/// - `jsonrpc` equals the string `"2.0"`;
/// - requests carry an integer-or-string `id` and a string `method`;
/// - `params`, when present, is an object or an array;
/// - responses carry `id` and exactly one of `result`/`error`;
/// - notifications carry `method` and no `id`.
///
/// # Errors
///
/// Returns a [`DecodeError`] with the matching [`ParseErrorCode`] and the
/// best-effort recovered request ID. `MalformedJson` with a `None` ID is the
/// only unrecoverable case.
pub fn decode_message(bytes: &[u8]) -> Result<JsonRpcMessage, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|_| DecodeError::new(ParseErrorCode::MalformedJson, None))?;

    let Value::Object(ref obj) = value else {
        return Err(DecodeError::new(ParseErrorCode::MalformedJson, None));
    };

    // The ID is recovered up front so later failures can still name it.
    let recovered_id = obj.get("id").and_then(extract_id);

    match obj.get("jsonrpc") {
        None => return Err(DecodeError::new(ParseErrorCode::MissingJsonrpc, recovered_id)),
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(_) => {
            return Err(DecodeError::new(
                ParseErrorCode::InvalidJsonrpcVersion,
                recovered_id,
            ));
        }
    }

    let has_id = obj.contains_key("id");
    let has_method = obj.contains_key("method");
    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    if has_method {
        let method = match obj.get("method") {
            Some(Value::String(m)) => m.clone(),
            Some(_) => {
                return Err(DecodeError::new(
                    ParseErrorCode::InvalidMethodType,
                    recovered_id,
                ));
            }
            None => unreachable!(),
        };

        let params = match obj.get("params") {
            None | Some(Value::Null) => None,
            Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p.clone()),
            Some(_) => {
                return Err(DecodeError::new(
                    ParseErrorCode::InvalidParamsType,
                    recovered_id,
                ));
            }
        };

        if has_id {
            let id = match obj.get("id").and_then(extract_id) {
                Some(id) => id,
                None => return Err(DecodeError::new(ParseErrorCode::InvalidIdType, None)),
            };
            return Ok(JsonRpcMessage::Request(JsonRpcRequest {
                jsonrpc: JsonRpcVersion,
                id,
                method,
                params,
            }));
        }

        return Ok(JsonRpcMessage::Notification(JsonRpcNotification {
            jsonrpc: JsonRpcVersion,
            method,
            params,
        }));
    }

    if has_result || has_error {
        if !has_id {
            return Err(DecodeError::new(ParseErrorCode::MissingId, None));
        }
        // Responses to unrecoverable parse errors legitimately carry id: null.
        let id = match obj.get("id") {
            Some(Value::Null) => None,
            Some(v) => match extract_id(v) {
                Some(id) => Some(id),
                None => return Err(DecodeError::new(ParseErrorCode::InvalidIdType, None)),
            },
            None => unreachable!(),
        };

        if has_result == has_error {
            // Both or neither: not a well-formed response.
            return Err(DecodeError::new(ParseErrorCode::MalformedJson, id));
        }

        let payload = if has_result {
            crate::jsonrpc::JsonRpcResponsePayload::Success {
                result: obj["result"].clone(),
            }
        } else {
            let error: JsonRpcError = serde_json::from_value(obj["error"].clone())
                .map_err(|_| DecodeError::new(ParseErrorCode::MalformedJson, id.clone()))?;
            crate::jsonrpc::JsonRpcResponsePayload::Error { error }
        };

        return Ok(JsonRpcMessage::Response(JsonRpcResponse {
            jsonrpc: JsonRpcVersion,
            id: crate::jsonrpc::ResponseId(id),
            payload,
        }));
    }

    // Neither a method nor a result/error: we only know it had an envelope.
    Err(DecodeError::new(ParseErrorCode::MissingMethod, recovered_id))
}

/// Best-effort ID extraction from a raw frame that failed to decode
///
/// Used to address a parse-error response when [`decode_message`] gave up
/// before reaching the ID (for example on invalid UTF-8 tails this returns
/// `None` and the response goes out with `id: null`).
pub fn recover_request_id(bytes: &[u8]) -> Option<RequestId> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    value.get("id").and_then(extract_id)
}

fn extract_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}
