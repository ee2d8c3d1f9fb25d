//! Error types for the signaling server

/// Result type alias using the signaling server Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving rooms
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A client frame was rejected before reaching the protocol layer
    #[error("Frame rejected: {0}")]
    FrameRejected(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Error from the shared room layer
    #[error(transparent)]
    Core(#[from] huddle_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Errors caused by what the client sent; reported back and the connection kept
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::FrameRejected(_) | Error::Core(huddle_core::Error::InvalidMessage(_))
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocketError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FrameRejected("binary frames are not supported".to_string());
        assert_eq!(err.to_string(), "Frame rejected: binary frames are not supported");
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::FrameRejected("x".to_string()).is_client_error());
        assert!(Error::from(huddle_core::Error::InvalidMessage("x".to_string())).is_client_error());
        assert!(!Error::InvalidConfig("x".to_string()).is_client_error());
    }
}
