//! Signaling channel to the room server
//!
//! [`SignalSender`] is the outbound seam used by the peer manager; the
//! WebSocket [`SignalingClient`] is the production implementation.

pub mod client;

pub use client::SignalingClient;

use crate::Result;
use huddle_core::ClientMessage;

/// Outbound half of the signaling channel.
///
/// Sending only enqueues the frame; delivery to the remote is best effort.
pub trait SignalSender: Send + Sync {
    fn send(&self, message: ClientMessage) -> Result<()>;

    /// Close the channel after every frame already queued. The server treats
    /// this as leaving the room.
    fn close(&self) -> Result<()>;
}
