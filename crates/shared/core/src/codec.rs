//! Stateless codec between wire bytes and typed messages
//!
//! Two inbound formats are accepted:
//! - JSON-RPC 2.0 (`{"jsonrpc":"2.0","id":..,"method":..,"params":..}`)
//! - legacy signed messages (`{"signature":..,"body":{..}}`), either bare or
//!   carried as the `params` of a JSON-RPC envelope
//!
//! Error responses are always JSON-RPC error envelopes, whatever format the
//! request used.

use crate::api::{ErrorCode, Message};
use crate::jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use thiserror::Error;

/// Last-resort body if serializing an error envelope ever fails
const FALLBACK_ERROR_RESPONSE: &[u8] =
    br#"{"jsonrpc":"2.0","id":"","error":{"code":-32000,"message":"internal server error"}}"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("unsupported JSON-RPC version: {0:?}")]
    InvalidVersion(String),

    #[error("empty request id")]
    EmptyId,

    #[error("empty method")]
    EmptyMethod,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("encoding failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e.to_string())
    }
}

/// A decoded user request
#[derive(Debug, Clone, PartialEq)]
pub enum UserRequest {
    Legacy(Message),
    JsonRpc(JsonRpcRequest),
}

impl UserRequest {
    /// Correlation id of the request
    pub fn id(&self) -> &str {
        match self {
            UserRequest::Legacy(msg) => msg.id(),
            UserRequest::JsonRpc(req) => &req.id,
        }
    }
}

/// Decode an inbound user request.
///
/// A top-level `jsonrpc` field selects JSON-RPC decoding; a JSON-RPC request
/// whose `params` is a legacy message with a DON id is returned as
/// [`UserRequest::Legacy`]. Anything else is decoded as a bare legacy message.
pub fn decode_request(raw: &[u8], auth: &str) -> Result<UserRequest, CodecError> {
    let value: Value = serde_json::from_slice(raw)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }

    if value.get("jsonrpc").is_some() {
        let mut request: JsonRpcRequest = serde_json::from_value(value)?;
        request.validate()?;
        request.auth = auth.to_string();

        if let Some(msg) = wrapped_legacy_message(&request) {
            return Ok(UserRequest::Legacy(msg));
        }
        return Ok(UserRequest::JsonRpc(request));
    }

    let msg: Message = serde_json::from_value(value)?;
    Ok(UserRequest::Legacy(msg))
}

fn wrapped_legacy_message(request: &JsonRpcRequest) -> Option<Message> {
    let params = request.params.as_ref()?;
    params.get("body")?;
    match serde_json::from_value::<Message>(params.clone()) {
        Ok(msg) if !msg.body.don_id.is_empty() => Some(msg),
        _ => None,
    }
}

/// Encode a JSON-RPC request
pub fn encode_request(request: &JsonRpcRequest) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(request).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Encode a bare legacy message
pub fn encode_legacy_request(msg: &Message) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(msg).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Encode a JSON-RPC response
pub fn encode_response(response: &JsonRpcResponse) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(response).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode and validate a JSON-RPC response
pub fn decode_response(raw: &[u8]) -> Result<JsonRpcResponse, CodecError> {
    let response: JsonRpcResponse = serde_json::from_slice(raw)?;
    response.validate()?;
    Ok(response)
}

/// Encode a legacy response message as a JSON-RPC result keyed by its message id
pub fn encode_legacy_response(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let result = serde_json::to_value(msg).map_err(|e| CodecError::Encode(e.to_string()))?;
    encode_response(&JsonRpcResponse::success(msg.id(), result))
}

/// Decode a response produced by [`encode_legacy_response`]
pub fn decode_legacy_response(raw: &[u8]) -> Result<Message, CodecError> {
    let response = decode_response(raw)?;
    match response.result {
        Some(result) => Ok(serde_json::from_value(result)?),
        None => Err(CodecError::InvalidResponse(
            "legacy response carries an error".to_string(),
        )),
    }
}

/// Encode a JSON-RPC error envelope. Never fails and never returns an empty body.
pub fn encode_error_response(
    id: &str,
    error_code: ErrorCode,
    message: &str,
    data: Option<Value>,
) -> Vec<u8> {
    let response = JsonRpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: id.to_string(),
        result: None,
        error: Some(JsonRpcError {
            code: error_code.jsonrpc_code(),
            message: message.to_string(),
            data,
        }),
    };
    serde_json::to_vec(&response).unwrap_or_else(|_| FALLBACK_ERROR_RESPONSE.to_vec())
}
