//! Legacy signed message envelope
//!
//! Wire shape:
//!
//! ```text
//! {
//!   "signature": "0x<65 bytes hex>",
//!   "body": { "message_id", "method", "don_id", "receiver", "payload", "sender" }
//! }
//! ```
//!
//! The signature covers the body packed into fixed-width, zero-padded slots
//! (`message_id` | `method` | `don_id` | `receiver`) followed by the payload's
//! JSON bytes. `sender` is not signed; it must equal the recovered signer.

use crate::address::{format_address, normalize_address};
use crate::signing::{self, SecretKey, SignatureError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MESSAGE_ID_MAX_LEN: usize = 128;
pub const MESSAGE_METHOD_MAX_LEN: usize = 64;
pub const MESSAGE_DON_ID_MAX_LEN: usize = 64;
pub const MESSAGE_RECEIVER_LEN: usize = 2 + 2 * 20;

const NULL_CHAR: char = '\0';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("empty message id")]
    EmptyMessageId,

    #[error("message id too long: {0} bytes")]
    MessageIdTooLong(usize),

    #[error("message id ends with null bytes")]
    MessageIdNullSuffix,

    #[error("method too long: {0} bytes")]
    MethodTooLong(usize),

    #[error("DON id too long: {0} bytes")]
    DonIdTooLong(usize),

    #[error("DON id ends with null bytes")]
    DonIdNullSuffix,

    #[error("invalid receiver length: {0}")]
    InvalidReceiver(usize),

    #[error("invalid signature encoding: {0}")]
    SignatureEncoding(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("sender {sender} doesn't match signer {signer}")]
    SenderMismatch { sender: String, signer: String },
}

/// Signed part of a legacy message (plus the unsigned `sender`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub don_id: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default)]
    pub sender: String,
}

/// Legacy signed envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// `0x`-prefixed hex of the 65-byte signature
    #[serde(default)]
    pub signature: String,
    pub body: MessageBody,
}

impl Message {
    /// Create an unsigned message
    pub fn new(
        message_id: impl Into<String>,
        method: impl Into<String>,
        don_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            signature: String::new(),
            body: MessageBody {
                message_id: message_id.into(),
                method: method.into(),
                don_id: don_id.into(),
                receiver: String::new(),
                payload,
                sender: String::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.body.message_id
    }

    /// Bytes covered by the signature
    pub fn raw_body(&self) -> Vec<u8> {
        let body = &self.body;
        let payload = if body.payload.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&body.payload).unwrap_or_default()
        };

        let mut raw = Vec::with_capacity(
            MESSAGE_ID_MAX_LEN
                + MESSAGE_METHOD_MAX_LEN
                + MESSAGE_DON_ID_MAX_LEN
                + MESSAGE_RECEIVER_LEN
                + payload.len(),
        );
        push_aligned(&mut raw, body.message_id.as_bytes(), MESSAGE_ID_MAX_LEN);
        push_aligned(&mut raw, body.method.as_bytes(), MESSAGE_METHOD_MAX_LEN);
        push_aligned(&mut raw, body.don_id.as_bytes(), MESSAGE_DON_ID_MAX_LEN);
        push_aligned(&mut raw, body.receiver.as_bytes(), MESSAGE_RECEIVER_LEN);
        raw.extend_from_slice(&payload);
        raw
    }

    /// Sign the body, setting `sender` to the signer's address
    pub fn sign(&mut self, secret_key: &SecretKey) {
        self.body.sender = signing::address_of(secret_key);
        let signature = signing::sign_digest(secret_key, signing::keccak256(&self.raw_body()));
        self.signature = format!("0x{}", hex::encode(signature));
    }

    /// Recover the lower-case address that produced `signature`
    pub fn extract_signer(&self) -> Result<String, MessageError> {
        let encoded = self
            .signature
            .strip_prefix("0x")
            .unwrap_or(&self.signature);
        let signature =
            hex::decode(encoded).map_err(|e| MessageError::SignatureEncoding(e.to_string()))?;
        let signer = signing::recover_address(signing::keccak256(&self.raw_body()), &signature)?;
        Ok(format_address(&signer))
    }

    /// Field shape checks (no signature verification)
    pub fn validate_shape(&self) -> Result<(), MessageError> {
        let body = &self.body;
        if body.message_id.is_empty() {
            return Err(MessageError::EmptyMessageId);
        }
        if body.message_id.len() > MESSAGE_ID_MAX_LEN {
            return Err(MessageError::MessageIdTooLong(body.message_id.len()));
        }
        if body.message_id.ends_with(NULL_CHAR) {
            return Err(MessageError::MessageIdNullSuffix);
        }
        if body.method.len() > MESSAGE_METHOD_MAX_LEN {
            return Err(MessageError::MethodTooLong(body.method.len()));
        }
        if body.don_id.len() > MESSAGE_DON_ID_MAX_LEN {
            return Err(MessageError::DonIdTooLong(body.don_id.len()));
        }
        if body.don_id.ends_with(NULL_CHAR) {
            return Err(MessageError::DonIdNullSuffix);
        }
        if !body.receiver.is_empty() && body.receiver.len() != MESSAGE_RECEIVER_LEN {
            return Err(MessageError::InvalidReceiver(body.receiver.len()));
        }
        Ok(())
    }

    /// Shape checks plus signer == sender
    pub fn validate(&self) -> Result<(), MessageError> {
        self.validate_shape()?;

        let signer = self.extract_signer()?;
        let sender = normalize_address(&self.body.sender);
        if sender != signer {
            return Err(MessageError::SenderMismatch { sender, signer });
        }
        Ok(())
    }
}

fn push_aligned(out: &mut Vec<u8>, field: &[u8], width: usize) {
    let len = field.len().min(width);
    out.extend_from_slice(&field[..len]);
    out.resize(out.len() + (width - len), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> SecretKey {
        SecretKey::from_slice(&[0x42; 32]).unwrap()
    }

    fn signed(message_id: &str) -> Message {
        let mut msg = Message::new(message_id, "add", "don-1", json!({"a": 1}));
        msg.sign(&key());
        msg
    }

    #[test]
    fn test_raw_body_layout() {
        let msg = Message::new("id", "m", "d", Value::Null);
        let raw = msg.raw_body();
        assert_eq!(
            raw.len(),
            MESSAGE_ID_MAX_LEN + MESSAGE_METHOD_MAX_LEN + MESSAGE_DON_ID_MAX_LEN + MESSAGE_RECEIVER_LEN
        );
        assert_eq!(&raw[..2], b"id");
        assert_eq!(raw[2], 0);
        assert_eq!(raw[MESSAGE_ID_MAX_LEN], b'm');
    }

    #[test]
    fn test_signed_message_validates() {
        let msg = signed("req-1");
        assert!(msg.signature.starts_with("0x"));
        assert_eq!(msg.signature.len(), 2 + 2 * 65);
        assert!(msg.validate().is_ok());
        assert_eq!(msg.extract_signer().unwrap(), msg.body.sender);
    }

    #[test]
    fn test_tampered_payload_fails() {
        let mut msg = signed("req-1");
        msg.body.payload = json!({"a": 2});
        assert!(matches!(
            msg.validate(),
            Err(MessageError::SenderMismatch { .. }) | Err(MessageError::Signature(_))
        ));
    }

    #[test]
    fn test_sender_compared_lower_case() {
        let mut msg = signed("req-1");
        msg.body.sender = msg.body.sender.to_uppercase().replacen("0X", "0x", 1);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_shape_errors() {
        let mut msg = signed("");
        assert_eq!(msg.validate_shape(), Err(MessageError::EmptyMessageId));

        msg.body.message_id = "x".repeat(MESSAGE_ID_MAX_LEN + 1);
        assert_eq!(
            msg.validate_shape(),
            Err(MessageError::MessageIdTooLong(MESSAGE_ID_MAX_LEN + 1))
        );

        msg.body.message_id = "abc\0".to_string();
        assert_eq!(msg.validate_shape(), Err(MessageError::MessageIdNullSuffix));

        msg.body.message_id = "abc".to_string();
        msg.body.don_id = "don\0".to_string();
        assert_eq!(msg.validate_shape(), Err(MessageError::DonIdNullSuffix));

        msg.body.don_id = "don".to_string();
        msg.body.receiver = "0x1234".to_string();
        assert_eq!(msg.validate_shape(), Err(MessageError::InvalidReceiver(6)));
    }

    #[test]
    fn test_bad_signature_encoding() {
        let mut msg = signed("req-1");
        msg.signature = "0xzz".to_string();
        assert!(matches!(
            msg.validate(),
            Err(MessageError::SignatureEncoding(_))
        ));
    }
}
