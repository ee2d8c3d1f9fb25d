//! Peer link management for the mesh

mod connection;
mod link;
mod manager;
mod rtc;

pub use connection::{LinkSignal, PeerConnection, PeerConnector, RemoteMedia, TransportState};
pub use link::{LinkEvent, LinkId, LinkState};
pub use manager::{PeerLink, PeerManager, MAX_ORPHAN_CANDIDATES};
pub use rtc::{LocalAudio, RtcConnector, RtcPeerConnection};
