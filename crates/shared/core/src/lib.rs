//! DON Gateway Core Domain
//!
//! Pure domain types for the DON gateway.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! - [`api`]: legacy signed messages, error codes and callback payloads
//! - [`jsonrpc`]: JSON-RPC 2.0 request/response envelopes
//! - [`codec`]: wire bytes <-> typed messages
//! - [`address`]: account address validation
//! - [`signing`]: Keccak-256 digests and recoverable secp256k1 signatures

pub mod address;
pub mod api;
pub mod codec;
pub mod jsonrpc;
pub mod signing;

// Re-export commonly used types at crate root
pub use address::{is_valid_address, normalize_address};
pub use api::{
    ErrorCode, Message, MessageBody, MessageError, UserCallbackPayload, MESSAGE_DON_ID_MAX_LEN,
    MESSAGE_ID_MAX_LEN, MESSAGE_METHOD_MAX_LEN, MESSAGE_RECEIVER_LEN,
};
pub use codec::{CodecError, UserRequest};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
