use crate::api::ErrorCode;
use crate::codec;

/// Generic message returned in place of internal encoding failures
const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Outcome of one user request, written exactly once to its callback channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCallbackPayload {
    /// Encoded wire response (JSON-RPC result or error envelope)
    pub raw_response: Vec<u8>,
    pub error_code: ErrorCode,
}

impl UserCallbackPayload {
    pub fn success(raw_response: Vec<u8>) -> Self {
        Self {
            raw_response,
            error_code: ErrorCode::NoError,
        }
    }

    /// Build a JSON-RPC error envelope for `id`
    ///
    /// Node encoding failures are reported with a generic message.
    pub fn error(id: &str, error_code: ErrorCode, message: &str) -> Self {
        let message = match error_code {
            ErrorCode::NodeResponseEncodingError => INTERNAL_ERROR_MESSAGE,
            _ => message,
        };
        Self {
            raw_response: codec::encode_error_response(id, error_code, message, None),
            error_code,
        }
    }

    pub fn timeout(id: &str) -> Self {
        Self::error(id, ErrorCode::RequestTimeoutError, "request timed out")
    }

    pub fn http_status(&self) -> u16 {
        self.error_code.http_status()
    }
}
