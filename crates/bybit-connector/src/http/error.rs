/*
[INPUT]:  Error sources (transport, exchange envelope, serialization, auth, WebSocket)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

use crate::types::Market;

/// Main error type for the Bybit connector
#[derive(Error, Debug)]
pub enum BybitError {
    /// Request never produced a usable exchange response (transport failure,
    /// retries exhausted, non-JSON or non-2xx body)
    #[error("Failed request: {message} (status {status_code:?}); request: {request}")]
    FailedRequest {
        message: String,
        status_code: Option<u16>,
        request: String,
    },

    /// Exchange answered with a non-zero return code
    #[error("Invalid request (code {code}): {message}; request: {request}")]
    InvalidRequest {
        code: i64,
        message: String,
        request: String,
    },

    /// HTTP client error outside the request retry loop
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Private endpoint called without credentials
    #[error("Authenticated endpoints require an API key and secret")]
    MissingCredentials,

    /// Authentication rejected by the exchange
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Operation timed out
    #[error("Timeout after {duration}ms")]
    Timeout { duration: u64 },

    /// Endpoint has no route for the selected market
    #[error("Endpoint {endpoint} is not available for market {market}")]
    Unsupported {
        endpoint: &'static str,
        market: Market,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BybitError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BybitError::FailedRequest { .. }
                | BybitError::Http(_)
                | BybitError::Timeout { .. }
                | BybitError::WebSocket(_)
        )
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        match self {
            BybitError::MissingCredentials | BybitError::Authentication { .. } => true,
            // 10003 invalid api key, 10004 bad signature, 10005 permission denied
            BybitError::InvalidRequest { code, .. } => matches!(code, 10003..=10005),
            _ => false,
        }
    }

    /// Exchange return code, if this error carries one
    pub fn code(&self) -> Option<i64> {
        match self {
            BybitError::InvalidRequest { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, BybitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let timeout_err = BybitError::Timeout { duration: 10_000 };
        assert!(timeout_err.is_retryable());

        let invalid = BybitError::InvalidRequest {
            code: 10001,
            message: "params error".to_string(),
            request: "{}".to_string(),
        };
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.code(), Some(10001));
    }

    #[test]
    fn test_error_is_auth_error() {
        assert!(BybitError::MissingCredentials.is_auth_error());
        let bad_sign = BybitError::InvalidRequest {
            code: 10004,
            message: "error sign!".to_string(),
            request: "{}".to_string(),
        };
        assert!(bad_sign.is_auth_error());
        assert!(!BybitError::Timeout { duration: 30 }.is_auth_error());
    }

    #[test]
    fn test_unsupported_message() {
        let err = BybitError::Unsupported {
            endpoint: "set_auto_add_margin",
            market: Market::InversePerpetual,
        };
        assert_eq!(
            err.to_string(),
            "Endpoint set_auto_add_margin is not available for market inverse_perpetual"
        );
    }
}
