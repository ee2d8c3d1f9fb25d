//! Room signaling protocol
//!
//! Every frame is a JSON object `{"event": "<name>", "data": <payload>}` carried
//! as a WebSocket text message. Event names are kebab-case and payload fields
//! are camelCase, matching what browser clients emit.
//!
//! SDP and ICE payloads travel as opaque [`serde_json::Value`]s: the server
//! relays them verbatim and only clients decode them into
//! [`SessionDescription`] / [`IceCandidate`].

use crate::ids::{RoomId, SessionId, UserId};
use crate::notes::{NoteContent, RoomNote};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A room member as announced to other members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    /// Connection of the member
    pub session_id: SessionId,

    /// Label supplied by the member at join time
    pub display_name: String,
}

/// Messages sent by a client to the signaling server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter a room, creating it if nobody is in it yet
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        user_id: UserId,
        display_name: String,
    },

    /// SDP offer for one named session
    Offer { to: SessionId, sdp: Value },

    /// SDP answer for one named session
    Answer { to: SessionId, sdp: Value },

    /// ICE candidate for one named session
    IceCandidate { to: SessionId, candidate: Value },

    /// One debounced span of transcript text
    UserSpeech { text: String },

    /// Generated notes to persist and fan out to the room
    #[serde(rename_all = "camelCase")]
    SendNotes { room_id: RoomId, notes: NoteContent },
}

/// Messages sent by the signaling server to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent to a joiner: everyone who was in the room before it
    ExistingUsers(Vec<MemberInfo>),

    /// Sent to existing members when someone joins
    UserJoined(MemberInfo),

    /// Relayed offer, tagged with the sender's display name
    #[serde(rename_all = "camelCase")]
    Offer {
        from: SessionId,
        sdp: Value,
        display_name: String,
    },

    /// Relayed answer
    Answer { from: SessionId, sdp: Value },

    /// Relayed ICE candidate
    IceCandidate { from: SessionId, candidate: Value },

    /// Sent to remaining members when a session disconnects
    #[serde(rename_all = "camelCase")]
    UserLeft { session_id: SessionId },

    /// The batch of note records created by one distribution
    ReceiveNotes(Vec<RoomNote>),

    /// A frame from this client could not be processed
    Error { message: String },
}

impl ClientMessage {
    /// Convert message to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse message from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidMessage(format!("Failed to decode client message: {}", e)))
    }

    /// Get the event name
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join-room",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "ice-candidate",
            ClientMessage::UserSpeech { .. } => "user-speech",
            ClientMessage::SendNotes { .. } => "send-notes",
        }
    }
}

impl ServerMessage {
    /// Convert message to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse message from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidMessage(format!("Failed to decode server message: {}", e)))
    }

    /// Get the event name
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::ExistingUsers(_) => "existing-users",
            ServerMessage::UserJoined(_) => "user-joined",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "ice-candidate",
            ServerMessage::UserLeft { .. } => "user-left",
            ServerMessage::ReceiveNotes(_) => "receive-notes",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Kind of session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// Session description in the browser's `RTCSessionDescriptionInit` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Decode a relayed payload
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidMessage(format!("Invalid session description: {}", e)))
    }

    /// Encode for relaying
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// ICE candidate in the browser's `RTCIceCandidateInit` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    #[serde(default, rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Decode a relayed payload
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidMessage(format!("Invalid ICE candidate: {}", e)))
    }

    /// Encode for relaying
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
