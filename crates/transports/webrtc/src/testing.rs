//! In-process fakes for the connection and signaling seams

use crate::peer::{LinkId, LinkSignal, PeerConnection, PeerConnector};
use crate::signaling::SignalSender;
use crate::{Error, Result};
use async_trait::async_trait;
use huddle_core::{ClientMessage, IceCandidate, SdpType, SessionDescription, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AttachMedia,
    CreateOffer,
    CreateAnswer,
    RemoteDescription(SdpType),
    Candidate(String),
    Close,
}

type CallLog = Arc<Mutex<Vec<(SessionId, LinkId, Call)>>>;

#[derive(Default)]
pub struct FakeConnector {
    calls: CallLog,
    fail_offers: AtomicBool,
    signals: Mutex<HashMap<SessionId, (LinkId, mpsc::UnboundedSender<LinkSignal>)>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_offers(&self) {
        self.fail_offers.store(true, Ordering::SeqCst);
    }

    /// Calls made on connections to `remote`, in order
    pub fn calls_for(&self, remote: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|(r, _, _)| r.as_str() == remote)
            .map(|(_, _, call)| call.clone())
            .collect()
    }

    /// Post a signal as if the connection to `remote` had raised it
    pub fn emit(&self, remote: &str, signal: impl FnOnce(SessionId, LinkId) -> LinkSignal) {
        let signals = self.signals.lock();
        if let Some((link_id, tx)) = signals.get(&SessionId::from(remote)) {
            let _ = tx.send(signal(SessionId::from(remote), *link_id));
        }
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(
        &self,
        remote: &SessionId,
        link_id: LinkId,
        signals: mpsc::UnboundedSender<LinkSignal>,
    ) -> Result<Box<dyn PeerConnection>> {
        self.signals.lock().insert(remote.clone(), (link_id, signals));
        Ok(Box::new(FakeConnection {
            remote: remote.clone(),
            link_id,
            calls: Arc::clone(&self.calls),
            fail_offers: self.fail_offers.load(Ordering::SeqCst),
        }))
    }
}

struct FakeConnection {
    remote: SessionId,
    link_id: LinkId,
    calls: CallLog,
    fail_offers: bool,
}

impl FakeConnection {
    fn record(&self, call: Call) {
        self.calls
            .lock()
            .push((self.remote.clone(), self.link_id, call));
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn attach_local_media(&self) -> Result<()> {
        self.record(Call::AttachMedia);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.fail_offers {
            return Err(Error::SdpError("offer rejected".to_string()));
        }
        self.record(Call::CreateOffer);
        Ok(SessionDescription::offer(format!("offer-for-{}", self.remote)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(Call::CreateAnswer);
        Ok(SessionDescription::answer(format!("answer-for-{}", self.remote)))
    }

    async fn apply_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.record(Call::RemoteDescription(description.kind));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(Call::Candidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(Call::Close);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<ClientMessage>>,
    closed: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(|m| m.event_name()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SignalSender for RecordingSender {
    fn send(&self, message: ClientMessage) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SignalingError("closed".to_string()));
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn candidate(text: &str) -> serde_json::Value {
    serde_json::json!({"candidate": text, "sdpMid": "0", "sdpMLineIndex": 0})
}

pub fn offer_value(sdp: &str) -> serde_json::Value {
    serde_json::json!({"type": "offer", "sdp": sdp})
}

pub fn answer_value(sdp: &str) -> serde_json::Value {
    serde_json::json!({"type": "answer", "sdp": sdp})
}
