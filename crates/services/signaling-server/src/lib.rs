//! Huddle signaling server
//!
//! WebSocket server that keeps room membership, relays SDP offers, answers
//! and ICE candidates between members of the same room, and fans generated
//! notes out to everyone in a room.
//!
//! ```no_run
//! use huddle_signaling_server::{ServerConfig, SignalingServer};
//!
//! # tokio_test::block_on(async {
//! let server = SignalingServer::new(ServerConfig::default())?;
//! let handle = server.start().await?;
//! println!("listening on {}", handle.local_addr());
//! handle.shutdown().await;
//! # Ok::<(), huddle_signaling_server::Error>(())
//! # });
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fanout;
pub mod fragments;
pub mod handler;
pub mod registry;
pub mod relay;
pub mod server;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use fanout::{DistributionReport, NoteBroadcaster};
pub use fragments::{FragmentSink, LoggingFragmentSink};
pub use registry::{MemberHandle, SessionInfo, SessionRegistry};
pub use relay::{DropReason, RelayOutcome, SignalingRelay};
pub use server::{ServerHandle, SignalingServer};

/// Server version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
