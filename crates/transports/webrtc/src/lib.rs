//! Room client for Huddle collaborative rooms
//!
//! Each participant opens one WebSocket to the signaling server and one
//! WebRTC peer connection per other member (full mesh).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  Application                                           │
//! │  ↓ RoomHandle (record_transcript, end_session)         │
//! │  RoomClient task                                       │
//! │  ├─ SignalingClient (JSON frames over WebSocket)       │
//! │  ├─ PeerManager (one PeerLink per remote session)      │
//! │  │   └─ RtcPeerConnection (webrtc-rs)                  │
//! │  ├─ SpeechDebouncer → user-speech                      │
//! │  └─ Summarizer → send-notes                            │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Negotiation order follows membership: a member that receives
//! `user-joined` offers, the newcomer only answers.
//!
//! # Example
//!
//! ```
//! use huddle_webrtc::ClientConfig;
//!
//! let config = ClientConfig {
//!     signaling_url: "ws://localhost:8000".to_string(),
//!     summarizer_url: Some("http://localhost:8000/generate-notes".to_string()),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use huddle_core::{RoomId, Speaker, UserId};
//! use huddle_webrtc::{ClientConfig, JoinRequest, RoomClient};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig {
//!     summarizer_url: Some("http://localhost:8000/generate-notes".to_string()),
//!     ..Default::default()
//! };
//! let request = JoinRequest {
//!     room_id: RoomId::from("standup"),
//!     user_id: UserId::from("u-42"),
//!     display_name: "Ada".to_string(),
//! };
//! let (room, _events, _task) = RoomClient::connect(&config, request).await?;
//! room.record_transcript(Speaker::User, "Morning all")?;
//! let _notes = room.end_session().await?;
//! # Ok::<(), huddle_webrtc::Error>(())
//! # });
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod peer;
pub mod room;
pub mod signaling;
pub mod summarizer;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use peer::{
    LinkEvent, LinkId, LinkSignal, LinkState, LocalAudio, PeerConnection, PeerConnector,
    PeerManager, RemoteMedia, RtcConnector, TransportState,
};
pub use room::{JoinRequest, RoomClient, RoomEvent, RoomHandle, RoomSession};
pub use signaling::{SignalSender, SignalingClient};
pub use summarizer::HttpSummarizer;

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
