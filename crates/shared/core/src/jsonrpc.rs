//! JSON-RPC 2.0 envelopes
//!
//! Request and response ids are strings; they double as correlation keys
//! for node fan-out.

use crate::codec::CodecError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The only protocol version accepted on the wire
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Auth header received alongside the request; never serialized
    #[serde(skip)]
    pub auth: String,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
            auth: String::new(),
        }
    }

    /// Check version, id and method
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(CodecError::InvalidVersion(self.jsonrpc.clone()));
        }
        if self.id.is_empty() {
            return Err(CodecError::EmptyId);
        }
        if self.method.is_empty() {
            return Err(CodecError::EmptyMethod);
        }
        Ok(())
    }

    /// Service name used for routing: the method up to the first `.`
    ///
    /// `"vault.secrets.get"` routes to `"vault"`, `"echo"` routes to `"echo"`.
    pub fn service_name(&self) -> &str {
        self.method
            .split_once('.')
            .map_or(self.method.as_str(), |(service, _)| service)
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response envelope: `result` XOR `error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check version and the result/error exclusivity
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(CodecError::InvalidVersion(self.jsonrpc.clone()));
        }
        if self.result.is_some() == self.error.is_some() {
            return Err(CodecError::InvalidResponse(
                "exactly one of result or error must be set".to_string(),
            ));
        }
        Ok(())
    }
}

// A present `"result": null` is still a result
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
