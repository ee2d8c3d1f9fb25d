//! Server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Smallest accepted frame limit; a join frame with long names must fit
pub const MIN_MESSAGE_BYTES: usize = 1024;

/// Signaling server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to accept WebSocket connections on
    pub bind_address: SocketAddr,

    /// Largest text frame accepted from a client (default: 64 KiB)
    pub max_message_bytes: usize,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_message_bytes: 64 * 1024,
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_message_bytes < MIN_MESSAGE_BYTES {
            return Err(crate::Error::InvalidConfig(format!(
                "max_message_bytes must be at least {}, got {}",
                MIN_MESSAGE_BYTES, self.max_message_bytes
            )));
        }

        Ok(())
    }

    /// Loopback config on an ephemeral port
    pub fn local() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address.port(), 8000);
    }

    #[test]
    fn test_tiny_frame_limit_rejected() {
        let config = ServerConfig {
            max_message_bytes: 16,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
