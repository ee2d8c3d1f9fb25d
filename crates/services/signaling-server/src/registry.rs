//! Session registry: room membership for every connected session
//!
//! Rooms live in a [`DashMap`] of per-room mutexes, so membership changes in
//! one room never wait on another. A room exists only while it has members;
//! the last leaver marks it closed and removes it, and a join that finds a
//! closed room retries on a fresh entry.

use dashmap::DashMap;
use huddle_core::{MemberInfo, RoomId, ServerMessage, SessionId, UserId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound queue of one connection
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// A connected, joined session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: String,
}

/// A member as seen at snapshot time, with a way to reach it
#[derive(Debug, Clone)]
pub struct MemberHandle {
    pub info: SessionInfo,
    outbox: Outbox,
}

impl MemberHandle {
    /// Queue a message; false if the connection is already gone
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbox.send(message).is_ok()
    }

    fn member_info(&self) -> MemberInfo {
        MemberInfo {
            session_id: self.info.session_id.clone(),
            display_name: self.info.display_name.clone(),
        }
    }
}

#[derive(Default)]
struct Room {
    /// Join order
    members: Vec<MemberHandle>,
    closed: bool,
}

/// Process-wide map of rooms and sessions
#[derive(Default)]
pub struct SessionRegistry {
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
    sessions: DashMap<SessionId, MemberHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `session_id` to `room_id`, creating the room if needed.
    ///
    /// Existing members get `user-joined`; the joiner gets `existing-users`
    /// listing the prior members in join order. A session that is already in
    /// a room leaves it first. Returns the prior members.
    pub fn join(
        &self,
        session_id: SessionId,
        room_id: RoomId,
        user_id: UserId,
        display_name: String,
        outbox: Outbox,
    ) -> Vec<MemberInfo> {
        if self.sessions.contains_key(&session_id) {
            debug!(session_id = %session_id, "Session switching rooms");
            self.leave(&session_id);
        }

        let joiner = MemberHandle {
            info: SessionInfo {
                session_id: session_id.clone(),
                room_id: room_id.clone(),
                user_id,
                display_name,
            },
            outbox,
        };

        loop {
            let room = self
                .rooms
                .entry(room_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Room::default())))
                .clone();

            let mut room = room.lock();
            if room.closed {
                debug!(room_id = %room_id, "Room closed while joining, retrying");
                continue;
            }

            let existing: Vec<MemberInfo> = room.members.iter().map(|m| m.member_info()).collect();
            let announcement = ServerMessage::UserJoined(joiner.member_info());
            for member in &room.members {
                member.send(announcement.clone());
            }
            joiner.send(ServerMessage::ExistingUsers(existing.clone()));

            room.members.push(joiner.clone());
            self.sessions.insert(session_id.clone(), joiner);

            info!(
                room_id = %room_id,
                session_id = %session_id,
                members = room.members.len(),
                "Session joined room"
            );
            return existing;
        }
    }

    /// Remove a session from its room and notify the remaining members.
    ///
    /// Returns the session that left, or `None` if it never joined.
    pub fn leave(&self, session_id: &SessionId) -> Option<SessionInfo> {
        let (_, handle) = self.sessions.remove(session_id)?;
        let room_id = handle.info.room_id.clone();

        let room_arc = self.rooms.get(&room_id).map(|entry| Arc::clone(entry.value()))?;
        let mut room = room_arc.lock();
        room.members.retain(|m| &m.info.session_id != session_id);

        let notice = ServerMessage::UserLeft {
            session_id: session_id.clone(),
        };
        for member in &room.members {
            member.send(notice.clone());
        }

        if room.members.is_empty() {
            room.closed = true;
            self.rooms
                .remove_if(&room_id, |_, current| Arc::ptr_eq(current, &room_arc));
            info!(room_id = %room_id, "Room emptied and discarded");
        }

        info!(
            room_id = %room_id,
            session_id = %session_id,
            remaining = room.members.len(),
            "Session left room"
        );
        Some(handle.info)
    }

    /// Membership of a joined session
    pub fn lookup(&self, session_id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(session_id).map(|entry| entry.info.clone())
    }

    pub(crate) fn handle(&self, session_id: &SessionId) -> Option<MemberHandle> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    /// Snapshot of a room's members in join order
    pub fn members(&self, room_id: &RoomId) -> Vec<MemberHandle> {
        let Some(room) = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value())) else {
            return Vec::new();
        };
        let room = room.lock();
        room.members.clone()
    }

    pub fn member_infos(&self, room_id: &RoomId) -> Vec<MemberInfo> {
        self.members(room_id).iter().map(|m| m.member_info()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
