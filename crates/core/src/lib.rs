//! Shared types for Huddle collaborative rooms
//!
//! Both the signaling server and the room client depend on this crate:
//!
//! - [`protocol`]: the `{"event", "data"}` WebSocket frames exchanged with the server
//! - [`notes`]: room note records, the [`NoteStore`] and [`Summarizer`] boundaries
//! - [`transcript`]: the labeled session transcript and the [`SpeechDebouncer`]
//!
//! # Example
//!
//! ```
//! use huddle_core::{ClientMessage, RoomId, UserId};
//!
//! let join = ClientMessage::JoinRoom {
//!     room_id: RoomId::from("standup"),
//!     user_id: UserId::from("u-42"),
//!     display_name: "Ada".to_string(),
//! };
//! let json = join.to_json().unwrap();
//! assert!(json.contains("\"event\":\"join-room\""));
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod notes;
pub mod protocol;
pub mod transcript;

pub use error::{Error, Result};
pub use ids::{RoomId, SessionId, UserId};
pub use notes::{parse_note_response, InMemoryNoteStore, NoteContent, NoteStore, RoomNote, Summarizer};
pub use protocol::{
    ClientMessage, IceCandidate, MemberInfo, SdpType, ServerMessage, SessionDescription,
};
pub use transcript::{
    SessionTranscript, Speaker, SpeechDebouncer, SpeechSink, DEFAULT_SPEECH_IDLE,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
