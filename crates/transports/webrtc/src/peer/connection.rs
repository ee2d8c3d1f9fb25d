//! Peer connection abstraction
//!
//! The manager drives negotiation through [`PeerConnection`]; connection
//! objects report back asynchronously by posting [`LinkSignal`]s into the
//! owning session task's channel.

use super::link::LinkId;
use crate::Result;
use async_trait::async_trait;
use huddle_core::{IceCandidate, SessionDescription, SessionId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

/// Transport-level connection state as reported by the connection object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    /// Transient; the transport may recover on its own
    Disconnected,
    Failed,
    Closed,
}

/// A media track received from a remote member
#[derive(Clone)]
pub struct RemoteMedia {
    pub track_id: String,
    pub stream_id: String,
    /// `audio` or `video`
    pub kind: String,
    /// Readable RTP track; `None` for connections that carry no real media
    pub track: Option<Arc<TrackRemote>>,
}

impl RemoteMedia {
    pub fn from_track(track: Arc<TrackRemote>) -> Self {
        Self {
            track_id: track.id(),
            stream_id: track.stream_id(),
            kind: track.kind().to_string(),
            track: Some(track),
        }
    }
}

impl fmt::Debug for RemoteMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMedia")
            .field("track_id", &self.track_id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RemoteMedia {
    fn eq(&self, other: &Self) -> bool {
        self.track_id == other.track_id
            && self.stream_id == other.stream_id
            && self.kind == other.kind
    }
}

/// Asynchronous notification from a connection object
#[derive(Debug, Clone, PartialEq)]
pub enum LinkSignal {
    /// A local ICE candidate to relay to the remote
    LocalCandidate {
        remote: SessionId,
        link_id: LinkId,
        candidate: IceCandidate,
    },
    /// The transport changed state
    StateChanged {
        remote: SessionId,
        link_id: LinkId,
        state: TransportState,
    },
    /// The remote started sending a track
    RemoteTrack {
        remote: SessionId,
        link_id: LinkId,
        media: RemoteMedia,
    },
}

impl LinkSignal {
    pub fn remote(&self) -> &SessionId {
        match self {
            LinkSignal::LocalCandidate { remote, .. }
            | LinkSignal::StateChanged { remote, .. }
            | LinkSignal::RemoteTrack { remote, .. } => remote,
        }
    }

    pub fn link_id(&self) -> LinkId {
        match self {
            LinkSignal::LocalCandidate { link_id, .. }
            | LinkSignal::StateChanged { link_id, .. }
            | LinkSignal::RemoteTrack { link_id, .. } => *link_id,
        }
    }
}

/// One peer-to-peer connection to a remote session
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach the local media tracks; called before offering or answering
    async fn attach_local_media(&self) -> Result<()>;

    /// Create an offer and install it as the local description
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create an answer and install it as the local description
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn apply_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Factory for connection objects
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a connection to `remote`. Callbacks must be posted to `signals`
    /// tagged with `link_id`.
    async fn connect(
        &self,
        remote: &SessionId,
        link_id: LinkId,
        signals: mpsc::UnboundedSender<LinkSignal>,
    ) -> Result<Box<dyn PeerConnection>>;
}
