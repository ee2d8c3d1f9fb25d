//! Mesh peer link management
//!
//! One [`PeerLink`] per remote session. The manager is owned by the room
//! session task and mutated only from there; connection callbacks reach it as
//! [`LinkSignal`]s through that task's channel.

use super::connection::{LinkSignal, PeerConnection, PeerConnector, RemoteMedia, TransportState};
use super::link::{LinkEvent, LinkId, LinkState};
use crate::signaling::SignalSender;
use crate::{Error, Result};
use huddle_core::{ClientMessage, IceCandidate, SdpType, SessionDescription, SessionId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-remote bound on candidates held before any link exists
pub const MAX_ORPHAN_CANDIDATES: usize = 32;

/// Negotiation state and connection for one remote session
pub struct PeerLink {
    remote: SessionId,
    link_id: LinkId,
    state: LinkState,
    connection: Box<dyn PeerConnection>,
    /// Remote candidates that arrived before the remote description
    pending_candidates: Vec<IceCandidate>,
    /// Media the remote is sending on this link
    remote_tracks: Vec<RemoteMedia>,
}

impl PeerLink {
    pub fn remote(&self) -> &SessionId {
        &self.remote
    }

    pub fn link_id(&self) -> LinkId {
        self.link_id
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    fn transition(&mut self, event: LinkEvent) -> Result<()> {
        let next = self.state.apply(event)?;
        debug!(
            remote = %self.remote,
            link_id = %self.link_id,
            "Link state transition: {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        Ok(())
    }

    async fn apply_pending_candidates(&mut self) {
        let pending = std::mem::take(&mut self.pending_candidates);
        if pending.is_empty() {
            return;
        }

        debug!(
            remote = %self.remote,
            count = pending.len(),
            "Applying queued ICE candidates"
        );
        for candidate in pending {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                warn!(remote = %self.remote, "Failed to apply queued ICE candidate: {}", e);
            }
        }
    }
}

/// Manages the peer links of one room session in a mesh topology
pub struct PeerManager {
    connector: Arc<dyn PeerConnector>,
    signaling: Arc<dyn SignalSender>,
    signals: mpsc::UnboundedSender<LinkSignal>,
    links: HashMap<SessionId, PeerLink>,
    /// Candidates from remotes we have no link with yet
    orphan_candidates: HashMap<SessionId, Vec<IceCandidate>>,
    next_link_id: u64,
}

impl PeerManager {
    /// Create a new peer manager
    ///
    /// # Arguments
    ///
    /// * `connector` - Factory for connection objects
    /// * `signaling` - Outbound signaling channel
    /// * `signals` - Channel connection callbacks post into
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        signaling: Arc<dyn SignalSender>,
        signals: mpsc::UnboundedSender<LinkSignal>,
    ) -> Self {
        Self {
            connector,
            signaling,
            signals,
            links: HashMap::new(),
            orphan_candidates: HashMap::new(),
            next_link_id: 0,
        }
    }

    /// Return the link to `remote`, creating it if needed
    pub async fn ensure_link(&mut self, remote: &SessionId) -> Result<LinkId> {
        if let Some(link) = self.links.get(remote) {
            return Ok(link.link_id);
        }

        self.next_link_id += 1;
        let link_id = LinkId(self.next_link_id);
        let connection = self
            .connector
            .connect(remote, link_id, self.signals.clone())
            .await?;

        let pending_candidates = self.orphan_candidates.remove(remote).unwrap_or_default();
        info!(
            remote = %remote,
            link_id = %link_id,
            queued = pending_candidates.len(),
            "Created peer link"
        );

        self.links.insert(
            remote.clone(),
            PeerLink {
                remote: remote.clone(),
                link_id,
                state: LinkState::Created,
                connection,
                pending_candidates,
                remote_tracks: Vec::new(),
            },
        );

        Ok(link_id)
    }

    /// Offer to a newly announced member. No-op if negotiation already started.
    pub async fn initiate_offer(&mut self, remote: &SessionId) -> Result<()> {
        self.ensure_link(remote).await?;
        let signaling = Arc::clone(&self.signaling);
        let link = self
            .links
            .get_mut(remote)
            .ok_or_else(|| Error::PeerNotFound(remote.to_string()))?;

        if link.state != LinkState::Created {
            debug!(remote = %remote, state = ?link.state, "Link already negotiating, ignoring announcement");
            return Ok(());
        }

        match Self::send_offer(link, signaling.as_ref()).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail_link(remote, e).await,
        }
    }

    async fn send_offer(link: &mut PeerLink, signaling: &dyn SignalSender) -> Result<()> {
        link.connection.attach_local_media().await?;
        let offer = link.connection.create_offer().await?;
        link.transition(LinkEvent::LocalOffer)?;

        signaling.send(ClientMessage::Offer {
            to: link.remote.clone(),
            sdp: offer.to_value()?,
        })?;

        info!(remote = %link.remote, "Sent offer");
        Ok(())
    }

    /// Answer an offer, creating the link if this is the first we hear of `from`
    pub async fn handle_inbound_offer(&mut self, from: &SessionId, sdp: Value) -> Result<()> {
        let offer = SessionDescription::from_value(sdp)?;
        if offer.kind != SdpType::Offer {
            return Err(Error::SdpError(format!(
                "Expected offer from {}, got {:?}",
                from, offer.kind
            )));
        }

        self.ensure_link(from).await?;
        let signaling = Arc::clone(&self.signaling);
        let link = self
            .links
            .get_mut(from)
            .ok_or_else(|| Error::PeerNotFound(from.to_string()))?;

        if let Err(e) = link.state.apply(LinkEvent::RemoteOffer) {
            warn!(remote = %from, "Ignoring offer: {}", e);
            return Ok(());
        }

        match Self::answer_offer(link, offer, signaling.as_ref()).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail_link(from, e).await,
        }
    }

    async fn answer_offer(
        link: &mut PeerLink,
        offer: SessionDescription,
        signaling: &dyn SignalSender,
    ) -> Result<()> {
        link.connection.attach_local_media().await?;
        link.connection.apply_remote_description(offer).await?;
        link.transition(LinkEvent::RemoteOffer)?;
        link.apply_pending_candidates().await;

        let answer = link.connection.create_answer().await?;
        link.transition(LinkEvent::LocalAnswer)?;

        signaling.send(ClientMessage::Answer {
            to: link.remote.clone(),
            sdp: answer.to_value()?,
        })?;

        info!(remote = %link.remote, "Sent answer");
        Ok(())
    }

    /// Apply an answer to an existing link; answers for unknown remotes are ignored
    pub async fn handle_inbound_answer(&mut self, from: &SessionId, sdp: Value) -> Result<()> {
        let answer = SessionDescription::from_value(sdp)?;
        if answer.kind != SdpType::Answer {
            return Err(Error::SdpError(format!(
                "Expected answer from {}, got {:?}",
                from, answer.kind
            )));
        }

        let Some(link) = self.links.get_mut(from) else {
            debug!(remote = %from, "No link for answer, ignoring");
            return Ok(());
        };

        if let Err(e) = link.state.apply(LinkEvent::RemoteAnswer) {
            warn!(remote = %from, "Ignoring answer: {}", e);
            return Ok(());
        }

        match Self::accept_answer(link, answer).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail_link(from, e).await,
        }
    }

    async fn accept_answer(link: &mut PeerLink, answer: SessionDescription) -> Result<()> {
        link.connection.apply_remote_description(answer).await?;
        link.transition(LinkEvent::RemoteAnswer)?;
        link.apply_pending_candidates().await;
        Ok(())
    }

    /// Apply or queue a remote ICE candidate
    pub async fn handle_inbound_candidate(&mut self, from: &SessionId, candidate: Value) -> Result<()> {
        let candidate = IceCandidate::from_value(candidate)?;

        match self.links.get_mut(from) {
            Some(link) if link.state.has_remote_description() => {
                if let Err(e) = link.connection.add_ice_candidate(candidate).await {
                    warn!(remote = %from, "Failed to add ICE candidate: {}", e);
                }
            }
            Some(link) => {
                debug!(remote = %from, state = ?link.state, "Queueing ICE candidate until remote description");
                link.pending_candidates.push(candidate);
            }
            None => {
                let queue = self.orphan_candidates.entry(from.clone()).or_default();
                if queue.len() >= MAX_ORPHAN_CANDIDATES {
                    debug!(remote = %from, "Orphan candidate queue full, dropping candidate");
                } else {
                    debug!(remote = %from, "ICE candidate before offer, holding as orphan");
                    queue.push(candidate);
                }
            }
        }

        Ok(())
    }

    /// Handle a callback from a connection object.
    ///
    /// Returns the remote media when the signal announced a new track on the
    /// current link.
    pub async fn handle_link_signal(&mut self, signal: LinkSignal) -> Result<Option<RemoteMedia>> {
        let remote = signal.remote().clone();
        let current = self.links.get(&remote).map(|link| link.link_id);
        if current != Some(signal.link_id()) {
            debug!(remote = %remote, link_id = %signal.link_id(), "Ignoring signal from stale link");
            return Ok(None);
        }

        match signal {
            LinkSignal::LocalCandidate { candidate, .. } => {
                self.signaling.send(ClientMessage::IceCandidate {
                    to: remote,
                    candidate: candidate.to_value()?,
                })?;
                Ok(None)
            }
            LinkSignal::StateChanged { state, .. } => {
                self.handle_transport_state(&remote, state).await;
                Ok(None)
            }
            LinkSignal::RemoteTrack { media, .. } => {
                let Some(link) = self.links.get_mut(&remote) else {
                    return Ok(None);
                };
                info!(
                    remote = %remote,
                    track_id = %media.track_id,
                    kind = %media.kind,
                    "Receiving remote track"
                );
                link.remote_tracks.push(media.clone());
                Ok(Some(media))
            }
        }
    }

    /// React to a transport state change on the current link to `remote`
    pub async fn handle_transport_state(&mut self, remote: &SessionId, state: TransportState) {
        match state {
            TransportState::Connected => {
                if let Some(link) = self.links.get_mut(remote) {
                    match link.transition(LinkEvent::TransportConnected) {
                        Ok(()) => info!(remote = %remote, "Peer link connected"),
                        Err(e) => warn!(remote = %remote, "Ignoring connected report: {}", e),
                    }
                }
            }
            TransportState::Failed | TransportState::Closed => {
                info!(remote = %remote, state = ?state, "Peer transport ended, tearing down link");
                self.teardown(remote).await;
            }
            TransportState::Disconnected => {
                info!(remote = %remote, "Peer transport disconnected, waiting for recovery");
            }
            TransportState::New | TransportState::Connecting => {
                debug!(remote = %remote, state = ?state, "Peer transport state");
            }
        }
    }

    /// Close and drop the link to `remote`. Returns whether a link existed.
    pub async fn teardown(&mut self, remote: &SessionId) -> bool {
        self.orphan_candidates.remove(remote);

        let Some(link) = self.links.remove(remote) else {
            return false;
        };

        if let Err(e) = link.connection.close().await {
            warn!(remote = %remote, "Error closing peer connection: {}", e);
        }

        info!(
            remote = %remote,
            link_id = %link.link_id,
            tracks = link.remote_tracks.len(),
            "Tore down peer link"
        );
        true
    }

    /// Tear down every link
    pub async fn teardown_all(&mut self) {
        let remotes: Vec<SessionId> = self.links.keys().cloned().collect();
        for remote in remotes {
            self.teardown(&remote).await;
        }
        self.orphan_candidates.clear();
    }

    async fn fail_link(&mut self, remote: &SessionId, err: Error) -> Result<()> {
        warn!(remote = %remote, "Negotiation failed, tearing down link: {}", err);
        self.teardown(remote).await;
        Err(err)
    }

    pub fn link_state(&self, remote: &SessionId) -> Option<LinkState> {
        self.links.get(remote).map(|link| link.state)
    }

    pub fn link_id(&self, remote: &SessionId) -> Option<LinkId> {
        self.links.get(remote).map(|link| link.link_id)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn remotes(&self) -> Vec<SessionId> {
        self.links.keys().cloned().collect()
    }

    pub fn pending_candidate_count(&self, remote: &SessionId) -> usize {
        self.links
            .get(remote)
            .map(|link| link.pending_candidates.len())
            .unwrap_or(0)
    }

    pub fn remote_tracks(&self, remote: &SessionId) -> Vec<RemoteMedia> {
        self.links
            .get(remote)
            .map(|link| link.remote_tracks.clone())
            .unwrap_or_default()
    }

    pub fn orphan_candidate_count(&self, remote: &SessionId) -> usize {
        self.orphan_candidates
            .get(remote)
            .map(|queue| queue.len())
            .unwrap_or(0)
    }
}
