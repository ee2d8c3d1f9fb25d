//! Room-scoped note fan-out

use crate::registry::SessionRegistry;
use huddle_core::{NoteContent, NoteStore, RoomId, RoomNote, ServerMessage, SessionId, UserId};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What one distribution did
#[derive(Debug, Clone, Default)]
pub struct DistributionReport {
    /// Records persisted, one per member that succeeded
    pub records: Vec<RoomNote>,
    /// Members whose record could not be persisted
    pub failed: Vec<SessionId>,
    /// Members the batch was queued to
    pub delivered: usize,
}

/// Persists a copy of generated notes for every member and broadcasts the batch
pub struct NoteBroadcaster {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn NoteStore>,
}

impl NoteBroadcaster {
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<dyn NoteStore>) -> Self {
        Self { registry, store }
    }

    /// Snapshot the room, persist one record per member, send the batch to all of them
    #[instrument(skip(self, notes), fields(room_id = %room_id))]
    pub async fn distribute(&self, room_id: &RoomId, notes: &NoteContent) -> DistributionReport {
        let members = self.registry.members(room_id);
        let mut report = DistributionReport::default();

        for member in &members {
            let record = RoomNote::new(room_id.clone(), member.info.user_id.clone(), notes);
            match self.store.create(record).await {
                Ok(stored) => report.records.push(stored),
                Err(e) => {
                    warn!(
                        session_id = %member.info.session_id,
                        user_id = %member.info.user_id,
                        "Failed to persist note record: {}",
                        e
                    );
                    report.failed.push(member.info.session_id.clone());
                }
            }
        }

        let batch = ServerMessage::ReceiveNotes(report.records.clone());
        report.delivered = members
            .iter()
            .filter(|member| member.send(batch.clone()))
            .count();

        info!(
            members = members.len(),
            records = report.records.len(),
            failed = report.failed.len(),
            delivered = report.delivered,
            "Distributed room notes"
        );
        report
    }

    /// Every record persisted for `user_id`, oldest first
    pub async fn notes_for_user(&self, user_id: &UserId) -> huddle_core::Result<Vec<RoomNote>> {
        self.store.list_for_user(user_id).await
    }

    /// Handle `send-notes`; only a member of `room_id` may trigger distribution
    pub async fn handle_send_notes(
        &self,
        sender: &SessionId,
        room_id: &RoomId,
        notes: &NoteContent,
    ) -> Option<DistributionReport> {
        match self.registry.lookup(sender) {
            Some(info) if &info.room_id == room_id => Some(self.distribute(room_id, notes).await),
            _ => {
                warn!(session_id = %sender, room_id = %room_id, "send-notes from non-member ignored");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use huddle_core::{Error, InMemoryNoteStore};
    use tokio::sync::mpsc;

    fn notes() -> NoteContent {
        NoteContent {
            summary_points: vec!["Roles agreed".to_string()],
            action_items: vec!["Book the room".to_string()],
            recap: "Kickoff.".to_string(),
        }
    }

    fn join(
        registry: &SessionRegistry,
        session: &str,
        user: &str,
        room: &str,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.join(
            SessionId::from(session),
            RoomId::from(room),
            UserId::from(user),
            session.to_string(),
            tx,
        );
        rx
    }

    fn last(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Option<ServerMessage> {
        let mut last = None;
        while let Ok(msg) = rx.try_recv() {
            last = Some(msg);
        }
        last
    }

    #[tokio::test]
    async fn test_one_record_per_member_and_batch_to_all() {
        let registry = Arc::new(SessionRegistry::new());
        let store = Arc::new(InMemoryNoteStore::new());
        let broadcaster = NoteBroadcaster::new(Arc::clone(&registry), store.clone());

        let mut a = join(&registry, "s-a", "u-a", "r1");
        let mut b = join(&registry, "s-b", "u-b", "r1");
        let mut c = join(&registry, "s-c", "u-c", "r1");
        let mut other = join(&registry, "s-d", "u-d", "r2");

        let report = broadcaster
            .handle_send_notes(&SessionId::from("s-a"), &RoomId::from("r1"), &notes())
            .await
            .unwrap();

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.delivered, 3);
        assert!(report.failed.is_empty());
        assert_eq!(store.len(), 3);
        let owners: Vec<_> = report.records.iter().map(|r| r.user_id.as_str().to_string()).collect();
        assert_eq!(owners, vec!["u-a", "u-b", "u-c"]);

        for rx in [&mut a, &mut b, &mut c] {
            match last(rx) {
                Some(ServerMessage::ReceiveNotes(batch)) => {
                    assert_eq!(batch, report.records);
                    assert_eq!(batch[0].recap, "Kickoff.");
                }
                other => panic!("expected receive-notes, got {:?}", other),
            }
        }
        assert!(!matches!(last(&mut other), Some(ServerMessage::ReceiveNotes(_))));

        let mine = broadcaster.notes_for_user(&UserId::from("u-b")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].room_id, RoomId::from("r1"));
        assert!(broadcaster
            .notes_for_user(&UserId::from("u-d"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_non_member_cannot_distribute() {
        let registry = Arc::new(SessionRegistry::new());
        let store = Arc::new(InMemoryNoteStore::new());
        let broadcaster = NoteBroadcaster::new(Arc::clone(&registry), store.clone());
        let _a = join(&registry, "s-a", "u-a", "r1");
        let _b = join(&registry, "s-b", "u-b", "r2");

        let report = broadcaster
            .handle_send_notes(&SessionId::from("s-b"), &RoomId::from("r1"), &notes())
            .await;
        assert!(report.is_none());
        assert!(store.is_empty());
    }

    struct FlakyStore {
        inner: InMemoryNoteStore,
        reject_user: UserId,
    }

    #[async_trait]
    impl NoteStore for FlakyStore {
        async fn create(&self, note: RoomNote) -> huddle_core::Result<RoomNote> {
            if note.user_id == self.reject_user {
                return Err(Error::Storage("constraint violation".to_string()));
            }
            self.inner.create(note).await
        }

        async fn list_for_user(&self, user_id: &UserId) -> huddle_core::Result<Vec<RoomNote>> {
            self.inner.list_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_skips_member_but_still_delivers() {
        let registry = Arc::new(SessionRegistry::new());
        let store = Arc::new(FlakyStore {
            inner: InMemoryNoteStore::new(),
            reject_user: UserId::from("u-b"),
        });
        let broadcaster = NoteBroadcaster::new(Arc::clone(&registry), store);

        let mut a = join(&registry, "s-a", "u-a", "r1");
        let mut b = join(&registry, "s-b", "u-b", "r1");

        let report = broadcaster.distribute(&RoomId::from("r1"), &notes()).await;
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.failed, vec![SessionId::from("s-b")]);
        assert_eq!(report.delivered, 2);

        for rx in [&mut a, &mut b] {
            match last(rx) {
                Some(ServerMessage::ReceiveNotes(batch)) => assert_eq!(batch.len(), 1),
                other => panic!("expected receive-notes, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_room_distributes_nothing() {
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = NoteBroadcaster::new(registry, Arc::new(InMemoryNoteStore::new()));
        let report = broadcaster.distribute(&RoomId::from("ghost"), &notes()).await;
        assert!(report.records.is_empty());
        assert_eq!(report.delivered, 0);
    }
}
