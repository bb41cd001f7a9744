//! Gateway API types shared by the router, handlers and nodes

pub mod callback;
pub mod error_code;
pub mod message;

pub use callback::UserCallbackPayload;
pub use error_code::ErrorCode;
pub use message::{
    MESSAGE_DON_ID_MAX_LEN, MESSAGE_ID_MAX_LEN, MESSAGE_METHOD_MAX_LEN, MESSAGE_RECEIVER_LEN,
    Message, MessageBody, MessageError,
};
