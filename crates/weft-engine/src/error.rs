//! Error types for weft-engine

use thiserror::Error;

/// Result type alias using weft-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Wire(#[from] weft_wire::Error),

    /// Every retry attempt failed; each attempt's error is listed
    #[error("submission failed after {attempts} attempts: {}", .errors.join("; "))]
    Exhausted {
        attempts: usize,
        errors: Vec<String>,
    },

    /// Both compaction tiers failed
    #[error("compaction failed: structural: {structural}; summary: {fallback}")]
    Compaction { structural: String, fallback: String },

    /// Persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// A generic engine error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error is retryable at the submission level
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Wire(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_lists_every_attempt() {
        let err = Error::Exhausted {
            attempts: 3,
            errors: vec![
                "HTTP status 503: unavailable".into(),
                "SSE error: connection reset".into(),
                "HTTP status 500: worker died".into(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("503"));
        assert!(text.contains("connection reset"));
        assert!(text.contains("worker died"));
    }

    #[test]
    fn test_compaction_keeps_both_causes() {
        let err = Error::Compaction {
            structural: "HTTP status 500: compact endpoint down".into(),
            fallback: "summary thread produced no text".into(),
        };
        let text = err.to_string();
        assert!(text.contains("compact endpoint down"));
        assert!(text.contains("no text"));
    }
}
