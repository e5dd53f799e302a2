//! Error types for the tool server

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for the tool server
pub type Result<T> = std::result::Result<T, ServerError>;

/// Tool server errors
///
/// Each variant is one of the surface-distinct error kinds: the variant
/// decides the HTTP status and the JSON-RPC code, the message carries the
/// user-visible detail.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration rejected at load; fatal to startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Request names a tool not present in the tool set
    #[error("tool not found: {0}")]
    UnknownTool(String),

    /// No service from the tool's required-auth list verified
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Parameter parsing, coercion, or missing-claim failure
    #[error("{0}")]
    BadRequest(String),

    /// A token was present in the request but failed verification
    #[error("invalid token for auth service {service}: {reason}")]
    TokenInvalid {
        /// Name of the auth service whose header carried the token
        service: String,
        /// Underlying verification failure
        reason: String,
    },

    /// Dispatch failure from the backing source
    #[error("{0}")]
    Backend(String),

    /// The request deadline elapsed during dispatch
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// Invariant violated; should be impossible
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status for the REST surface
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownTool(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) | Self::TokenInvalid { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeadlineExceeded(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization failed: {e}"))
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(
            ServerError::UnknownTool("t".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::BadRequest("p".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Unauthorized("t".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::TokenInvalid {
                service: "s".into(),
                reason: "expired".into()
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::DeadlineExceeded(std::time::Duration::from_secs(30)).status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn backend_message_is_preserved_verbatim() {
        let e = ServerError::Backend(
            "unable to execute query: ERROR: syntax error at or near \"SELEC\"".into(),
        );
        assert_eq!(
            e.to_string(),
            "unable to execute query: ERROR: syntax error at or near \"SELEC\""
        );
    }

    #[test]
    fn token_invalid_is_distinct_from_unauthorized() {
        let invalid = ServerError::TokenInvalid {
            service: "my-google-auth".into(),
            reason: "signature mismatch".into(),
        };
        assert!(invalid.to_string().contains("invalid token"));
        let unauth = ServerError::Unauthorized("my-tool".into());
        assert!(unauth.to_string().starts_with("unauthorized"));
    }
}
