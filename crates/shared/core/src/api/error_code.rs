//! Closed set of gateway outcome codes
//!
//! Every code maps to exactly one HTTP status and one JSON-RPC error code.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    NoError,
    UserMessageParseError,
    UnsupportedDonIdError,
    UnsupportedMethodError,
    InvalidParamsError,
    HandlerError,
    NodeResponseEncodingError,
    StaleNodeResponseError,
    RequestTimeoutError,
    FatalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 10] = [
        ErrorCode::NoError,
        ErrorCode::UserMessageParseError,
        ErrorCode::UnsupportedDonIdError,
        ErrorCode::UnsupportedMethodError,
        ErrorCode::InvalidParamsError,
        ErrorCode::HandlerError,
        ErrorCode::NodeResponseEncodingError,
        ErrorCode::StaleNodeResponseError,
        ErrorCode::RequestTimeoutError,
        ErrorCode::FatalError,
    ];

    /// HTTP status returned to the user
    pub fn http_status(self) -> u16 {
        match self {
            Self::NoError => 200,
            Self::UserMessageParseError
            | Self::UnsupportedDonIdError
            | Self::UnsupportedMethodError
            | Self::InvalidParamsError
            | Self::HandlerError
            | Self::FatalError => 400,
            // Never surfaced to users; mapped for totality
            Self::NodeResponseEncodingError | Self::StaleNodeResponseError => 500,
            Self::RequestTimeoutError => 504,
        }
    }

    /// JSON-RPC `error.code` (0 for success)
    pub fn jsonrpc_code(self) -> i64 {
        match self {
            Self::NoError => 0,
            Self::UserMessageParseError => -32700,
            Self::UnsupportedMethodError => -32601,
            Self::InvalidParamsError => -32602,
            Self::FatalError => -32000,
            Self::StaleNodeResponseError => -32001,
            Self::RequestTimeoutError => -32002,
            Self::NodeResponseEncodingError => -32003,
            Self::UnsupportedDonIdError => -32004,
            Self::HandlerError => -32005,
        }
    }

    /// Stable label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoError => "NoError",
            Self::UserMessageParseError => "UserMessageParseError",
            Self::UnsupportedDonIdError => "UnsupportedDONIdError",
            Self::UnsupportedMethodError => "UnsupportedMethodError",
            Self::InvalidParamsError => "InvalidParamsError",
            Self::HandlerError => "HandlerError",
            Self::NodeResponseEncodingError => "NodeResponseEncodingError",
            Self::StaleNodeResponseError => "StaleNodeResponseError",
            Self::RequestTimeoutError => "RequestTimeoutError",
            Self::FatalError => "FatalError",
        }
    }

    pub fn is_error(self) -> bool {
        self != Self::NoError
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
