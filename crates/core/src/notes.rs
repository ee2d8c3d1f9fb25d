//! Room notes: summarizer output, persisted per-member records, and the
//! storage / summarization collaborator boundaries.

use crate::ids::{RoomId, UserId};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Structured summary of one session, as produced by the summarizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteContent {
    /// Short statements, in order
    #[serde(default, alias = "summaryNotes")]
    pub summary_points: Vec<String>,

    /// Follow-ups, in order
    #[serde(default)]
    pub action_items: Vec<String>,

    /// One free-text paragraph
    #[serde(default)]
    pub recap: String,
}

impl NoteContent {
    pub fn is_empty(&self) -> bool {
        self.summary_points.is_empty() && self.action_items.is_empty() && self.recap.is_empty()
    }
}

/// A persisted copy of a room's notes, owned by one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNote {
    pub id: String,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub summary_points: Vec<String>,
    pub action_items: Vec<String>,
    pub recap: String,
    pub created_at: DateTime<Utc>,
}

impl RoomNote {
    /// Build a fresh record for `user_id` from generated content
    pub fn new(room_id: RoomId, user_id: UserId, content: &NoteContent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            room_id,
            user_id,
            summary_points: content.summary_points.clone(),
            action_items: content.action_items.clone(),
            recap: content.recap.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Persistence boundary for note records
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist one record and return it as stored
    async fn create(&self, note: RoomNote) -> Result<RoomNote>;

    /// All records owned by a user, oldest first
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<RoomNote>>;
}

/// Process-local [`NoteStore`]; records live as long as the store
///
/// ```
/// use huddle_core::{InMemoryNoteStore, NoteContent, NoteStore, RoomId, RoomNote, UserId};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryNoteStore::new();
/// let content = NoteContent { recap: "Kickoff.".to_string(), ..Default::default() };
/// let note = RoomNote::new(RoomId::from("r1"), UserId::from("u1"), &content);
/// store.create(note).await.unwrap();
///
/// let mine = store.list_for_user(&UserId::from("u1")).await.unwrap();
/// assert_eq!(mine[0].recap, "Kickoff.");
/// # });
/// ```
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: Mutex<Vec<RoomNote>>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.lock().is_empty()
    }

    /// Records for one room, oldest first
    pub fn for_room(&self, room_id: &RoomId) -> Vec<RoomNote> {
        self.notes
            .lock()
            .iter()
            .filter(|n| &n.room_id == room_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn create(&self, note: RoomNote) -> Result<RoomNote> {
        self.notes.lock().push(note.clone());
        Ok(note)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<RoomNote>> {
        Ok(self
            .notes
            .lock()
            .iter()
            .filter(|n| &n.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Turns a full-session transcript into structured notes
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<NoteContent>;
}

/// Extract notes from a free-form model reply.
///
/// Replies often wrap the JSON in Markdown fences or surround it with prose,
/// so fences are stripped and the outermost `{...}` span is decoded. A reply
/// without any object yields empty notes; an object that is not valid JSON is
/// an error.
pub fn parse_note_response(text: &str) -> Result<NoteContent> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let (start, end) = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Ok(NoteContent::default()),
    };

    serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| Error::Summarization(format!("Malformed notes object: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_reply_with_legacy_field() {
        let reply = "Here you go:\n```json\n{\n  \"summaryNotes\": [\"Roles matter\"],\n  \"actionItems\": [\"Assign roles\"],\n  \"recap\": \"We planned the sprint.\"\n}\n```";
        let notes = parse_note_response(reply).unwrap();
        assert_eq!(notes.summary_points, vec!["Roles matter".to_string()]);
        assert_eq!(notes.action_items, vec!["Assign roles".to_string()]);
        assert_eq!(notes.recap, "We planned the sprint.");
    }

    #[test]
    fn test_parse_reply_without_object_is_empty() {
        let notes = parse_note_response("I could not summarize that.").unwrap();
        assert!(notes.is_empty());
    }

    #[test]
    fn test_parse_broken_object_is_error() {
        let err = parse_note_response("{\"recap\": }").unwrap_err();
        assert!(matches!(err, Error::Summarization(_)));
    }

    #[test]
    fn test_note_content_serializes_summary_points() {
        let content = NoteContent {
            summary_points: vec!["a".to_string()],
            action_items: vec![],
            recap: "r".to_string(),
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["summaryPoints"][0], "a");
        assert_eq!(value["actionItems"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryNoteStore::new();
        let content = NoteContent {
            summary_points: vec!["p".to_string()],
            action_items: vec!["a".to_string()],
            recap: "r".to_string(),
        };
        let room = RoomId::from("r1");
        store
            .create(RoomNote::new(room.clone(), UserId::from("u1"), &content))
            .await
            .unwrap();
        store
            .create(RoomNote::new(room.clone(), UserId::from("u2"), &content))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.for_room(&room).len(), 2);
        let mine = store.list_for_user(&UserId::from("u1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].recap, "r");
    }
}
