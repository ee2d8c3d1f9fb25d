//! Per-link negotiation state machine

use crate::{Error, Result};
use std::fmt;

/// Identifies one incarnation of a link to a remote session.
///
/// A remote that leaves and rejoins gets a new link with a new id, so late
/// callbacks from the torn-down connection can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Negotiation state of a peer link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Connection object exists, nothing negotiated
    Created,
    /// Local offer sent, waiting for the answer
    OfferSent,
    /// Remote offer applied, answer not yet sent
    OfferReceived,
    /// Both descriptions in place
    AnswerExchanged,
    /// Transport reported connected
    Connected,
    /// Transport failed
    Failed,
    /// Closed locally or by the transport
    Closed,
}

/// Inputs that drive a [`LinkState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    LocalOffer,
    RemoteOffer,
    LocalAnswer,
    RemoteAnswer,
    TransportConnected,
    TransportFailed,
    TransportClosed,
}

impl LinkState {
    /// Compute the state after `event`, or an error if the event is not
    /// accepted in this state.
    pub fn apply(self, event: LinkEvent) -> Result<LinkState> {
        use LinkEvent::*;
        use LinkState::*;

        let next = match (self, event) {
            (Failed | Closed, _) => None,
            (_, TransportFailed) => Some(Failed),
            (_, TransportClosed) => Some(Closed),
            (Created, LocalOffer) => Some(OfferSent),
            (Created, RemoteOffer) => Some(OfferReceived),
            (OfferReceived, LocalAnswer) => Some(AnswerExchanged),
            (OfferSent, RemoteAnswer) => Some(AnswerExchanged),
            (AnswerExchanged | Connected, TransportConnected) => Some(Connected),
            _ => None,
        };

        next.ok_or_else(|| Error::InvalidTransition(format!("{:?} in state {:?}", event, self)))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Failed | LinkState::Closed)
    }

    /// Whether candidates can be applied directly instead of queued
    pub fn has_remote_description(&self) -> bool {
        matches!(
            self,
            LinkState::OfferReceived | LinkState::AnswerExchanged | LinkState::Connected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offerer_path() {
        let state = LinkState::Created
            .apply(LinkEvent::LocalOffer)
            .and_then(|s| s.apply(LinkEvent::RemoteAnswer))
            .and_then(|s| s.apply(LinkEvent::TransportConnected))
            .unwrap();
        assert_eq!(state, LinkState::Connected);
    }

    #[test]
    fn test_answerer_path() {
        let state = LinkState::Created.apply(LinkEvent::RemoteOffer).unwrap();
        assert_eq!(state, LinkState::OfferReceived);
        assert!(state.has_remote_description());
        let state = state.apply(LinkEvent::LocalAnswer).unwrap();
        assert_eq!(state, LinkState::AnswerExchanged);
    }

    #[test]
    fn test_glare_is_rejected() {
        let err = LinkState::OfferSent.apply(LinkEvent::RemoteOffer).unwrap_err();
        assert!(err.is_peer_error());
    }

    #[test]
    fn test_answer_without_offer_is_rejected() {
        assert!(LinkState::Created.apply(LinkEvent::RemoteAnswer).is_err());
        assert!(LinkState::Created.apply(LinkEvent::TransportConnected).is_err());
    }

    #[test]
    fn test_failure_from_any_live_state() {
        for state in [
            LinkState::Created,
            LinkState::OfferSent,
            LinkState::OfferReceived,
            LinkState::AnswerExchanged,
            LinkState::Connected,
        ] {
            assert_eq!(state.apply(LinkEvent::TransportFailed).unwrap(), LinkState::Failed);
            assert_eq!(state.apply(LinkEvent::TransportClosed).unwrap(), LinkState::Closed);
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        assert!(LinkState::Closed.is_terminal());
        assert!(LinkState::Failed.apply(LinkEvent::TransportConnected).is_err());
        assert!(LinkState::Closed.apply(LinkEvent::TransportClosed).is_err());
    }

    #[test]
    fn test_candidates_queue_before_remote_description() {
        assert!(!LinkState::Created.has_remote_description());
        assert!(!LinkState::OfferSent.has_remote_description());
        assert!(LinkState::Connected.has_remote_description());
    }
}
