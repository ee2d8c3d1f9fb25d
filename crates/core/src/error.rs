//! Error types for Huddle core

use thiserror::Error;

/// Result type alias for Huddle core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the shared room layer
#[derive(Debug, Error)]
pub enum Error {
    /// A wire message could not be decoded or did not match the protocol
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A note record could not be persisted
    #[error("Storage error: {0}")]
    Storage(String),

    /// The summarization collaborator failed or returned garbage
    #[error("Summarization failed: {0}")]
    Summarization(String),

    /// Buffered speech could not be handed downstream
    #[error("Speech dispatch failed: {0}")]
    Dispatch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors raised at the collaborator boundary (store, summarizer, speech sink)
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Summarization(_) | Error::Dispatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_collaborator_errors() {
        assert!(Error::Dispatch("closed".to_string()).is_collaborator_error());
        assert!(Error::Summarization("502".to_string()).is_collaborator_error());
        assert!(!Error::InvalidMessage("x".to_string()).is_collaborator_error());
    }

    #[test]
    fn test_serde_error_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(serde_err);
        assert!(matches!(err, Error::Serialization(_)));
    }
}
