//! Configuration types for the room client

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for a [`RoomClient`](crate::RoomClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket signaling server URL (ws:// or wss://)
    pub signaling_url: String,

    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Quiet period before buffered speech is flushed (default: 8000ms)
    pub speech_idle_ms: u64,

    /// HTTP endpoint of the note summarizer (optional)
    pub summarizer_url: Option<String>,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8000".to_string(),
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            speech_idle_ms: 8000,
            summarizer_url: None,
        }
    }
}

impl ClientConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") && !url.starts_with("stuns:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN URL must start with stun: or stuns:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        if self.speech_idle_ms == 0 {
            return Err(Error::InvalidConfig(
                "speech_idle_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(url) = &self.summarizer_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::InvalidConfig(format!(
                    "summarizer_url must start with http:// or https://, got {}",
                    url
                )));
            }
        }

        Ok(())
    }

    pub fn speech_idle(&self) -> Duration {
        Duration::from_millis(self.speech_idle_ms)
    }
}
