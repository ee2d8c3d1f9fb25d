//! Point-to-point relay of offers, answers and ICE candidates
//!
//! Payloads are forwarded verbatim and never inspected. Anything that cannot
//! be delivered is dropped: no queue, no retry, and the sender is not told.

use crate::registry::{MemberHandle, SessionRegistry};
use huddle_core::{ServerMessage, SessionId};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Why a signal was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sender has not joined a room
    SenderNotJoined,
    /// No joined session with the target id
    TargetNotConnected,
    /// Sender and target are in different rooms
    DifferentRoom,
}

/// Result of one relay attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    Dropped(DropReason),
}

/// Routes negotiation messages between two members of the same room
pub struct SignalingRelay {
    registry: Arc<SessionRegistry>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Forward an offer; the target also learns the sender's display name
    pub fn relay_offer(&self, from: &SessionId, to: &SessionId, sdp: Value) -> RelayOutcome {
        self.forward("offer", from, to, |sender| ServerMessage::Offer {
            from: from.clone(),
            sdp,
            display_name: sender.info.display_name.clone(),
        })
    }

    pub fn relay_answer(&self, from: &SessionId, to: &SessionId, sdp: Value) -> RelayOutcome {
        self.forward("answer", from, to, |_| ServerMessage::Answer {
            from: from.clone(),
            sdp,
        })
    }

    pub fn relay_candidate(&self, from: &SessionId, to: &SessionId, candidate: Value) -> RelayOutcome {
        self.forward("ice-candidate", from, to, |_| ServerMessage::IceCandidate {
            from: from.clone(),
            candidate,
        })
    }

    fn forward(
        &self,
        event: &'static str,
        from: &SessionId,
        to: &SessionId,
        build: impl FnOnce(&MemberHandle) -> ServerMessage,
    ) -> RelayOutcome {
        let outcome = self.try_forward(from, to, build);
        if let RelayOutcome::Dropped(reason) = outcome {
            debug!(event, from = %from, to = %to, ?reason, "Dropped signaling message");
        }
        outcome
    }

    fn try_forward(
        &self,
        from: &SessionId,
        to: &SessionId,
        build: impl FnOnce(&MemberHandle) -> ServerMessage,
    ) -> RelayOutcome {
        let Some(sender) = self.registry.handle(from) else {
            return RelayOutcome::Dropped(DropReason::SenderNotJoined);
        };
        let Some(target) = self.registry.handle(to) else {
            return RelayOutcome::Dropped(DropReason::TargetNotConnected);
        };
        if sender.info.room_id != target.info.room_id {
            return RelayOutcome::Dropped(DropReason::DifferentRoom);
        }

        if target.send(build(&sender)) {
            RelayOutcome::Delivered
        } else {
            RelayOutcome::Dropped(DropReason::TargetNotConnected)
        }
    }
}
