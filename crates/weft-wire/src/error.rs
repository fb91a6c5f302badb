//! Error types for weft-wire

use thiserror::Error;

/// Result type alias using weft-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a conversation backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Non-success HTTP status from the backend
    #[error("HTTP status {code}: {message}")]
    Status { code: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Stream was aborted
    #[error("Request aborted")]
    Aborted,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Response ended without finishing its output
    #[error("response incomplete: {reason}")]
    Incomplete { reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Create a status error from code and body text
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Transport failures, rate limits, and transient server statuses
    /// (408, 429, 500, 502, 503, 504) qualify. Other 4xx statuses are
    /// caller errors and never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Sse(_) => true,
            Error::Status { code, .. } => matches!(code, 408 | 429 | 500 | 502 | 503 | 504),
            Error::Api {
                error_type,
                message,
            } => {
                let et = error_type.to_lowercase();
                let msg = message.to_lowercase();
                // Rate limit / overload patterns in API errors
                et.contains("rate_limit")
                    || et.contains("overloaded")
                    || et.contains("server_error")
                    || msg.contains("rate limit")
                    || msg.contains("overloaded")
                    || msg.contains("too many requests")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- is_retryable on typed variants ---

    #[test]
    fn test_retryable_typed_variants() {
        assert!(Error::RateLimited { retry_after: Some(5) }.is_retryable());
        assert!(Error::Sse("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_retryable_transient_statuses() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(
                Error::status(code, "try again").is_retryable(),
                "status {code} should be retryable"
            );
        }
    }

    #[test]
    fn test_not_retryable_caller_statuses() {
        for code in [400, 401, 403, 404, 409, 422] {
            assert!(
                !Error::status(code, "bad request").is_retryable(),
                "status {code} should not be retryable"
            );
        }
    }

    // --- is_retryable on Api variant ---

    #[test]
    fn test_retryable_api_rate_limit_error_type() {
        let e = Error::api("rate_limit_error", "You have exceeded the rate limit");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_retryable_api_overloaded_message() {
        let e = Error::api("error", "API is overloaded right now");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_retryable_api_too_many_requests() {
        let e = Error::api("error", "Too many requests");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_not_retryable_api_auth() {
        let e = Error::api("authentication_error", "Invalid API key");
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_not_retryable_non_api() {
        assert!(!Error::InvalidApiKey.is_retryable());
        assert!(!Error::Aborted.is_retryable());
        assert!(!Error::UnexpectedResponse("weird".into()).is_retryable());
    }

    #[test]
    fn test_not_retryable_incomplete() {
        let e = Error::Incomplete {
            reason: "max_output_tokens".into(),
        };
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("response incomplete"));
    }
}
