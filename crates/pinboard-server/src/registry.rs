//! RoomRegistry — tracks which participant is in which room, and how to
//! reach them.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use pinboard_protocol::Presence;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Ephemeral per-connection state. Nothing in here survives a restart;
/// board state lives in storage, not in the registry.
#[derive(Default)]
struct Inner {
    /// participant → outbound frame channel
    senders: HashMap<String, mpsc::Sender<String>>,
    /// participant → the one room it currently occupies
    rooms: HashMap<String, String>,
    /// room → member set
    members: HashMap<String, HashSet<String>>,
    /// participant → display name, set via set-display-name
    names: HashMap<String, String>,
}

impl Inner {
    /// Drops the participant's membership, if any. Returns the room it
    /// was in. Names and senders are left alone.
    fn remove_from_room(&mut self, participant: &str) -> Option<String> {
        let room = self.rooms.remove(participant)?;
        if let Some(members) = self.members.get_mut(&room) {
            members.remove(participant);
            if members.is_empty() {
                self.members.remove(&room);
            }
        }
        Some(room)
    }
}

/// Tracks room membership for connected participants.
///
/// A participant occupies at most one room at a time. All four maps sit
/// behind a single parking_lot::RwLock so that `join`'s
/// remove-then-add runs under one guard with no await point in
/// between — a concurrent broadcast can never observe a participant in
/// two rooms, or in none, mid-join. Locks are held only for map
/// access; frames are pushed into the per-participant channels after
/// the guard is released.
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    /// Registers a participant's outbound channel at connect time.
    pub fn register(&self, participant: &str, tx: mpsc::Sender<String>) {
        self.inner.write().senders.insert(participant.to_owned(), tx);
        debug!("Participant registered: {participant}");
    }

    /// Moves the participant into `room`, leaving any previous room.
    pub fn join(&self, participant: &str, room: &str) {
        {
            let mut inner = self.inner.write();
            inner.remove_from_room(participant);
            inner.rooms.insert(participant.to_owned(), room.to_owned());
            inner
                .members
                .entry(room.to_owned())
                .or_default()
                .insert(participant.to_owned());
        }
        info!("Participant {participant} joined room {room}");
    }

    /// Removes the participant entirely: membership, display name and
    /// outbound channel. Returns the room it occupied, if any. Called
    /// on disconnect.
    pub fn leave(&self, participant: &str) -> Option<String> {
        let room = {
            let mut inner = self.inner.write();
            inner.senders.remove(participant);
            inner.names.remove(participant);
            inner.remove_from_room(participant)
        };
        if let Some(room) = &room {
            info!("Participant {participant} left room {room}");
        }
        room
    }

    /// The room the participant currently occupies.
    pub fn current_room(&self, participant: &str) -> Option<String> {
        self.inner.read().rooms.get(participant).cloned()
    }

    /// Everyone in the participant's room except the participant
    /// itself, with any display names they have announced.
    pub fn roommates(&self, participant: &str) -> Vec<Presence> {
        let inner = self.inner.read();
        let Some(room) = inner.rooms.get(participant) else {
            return Vec::new();
        };
        let Some(members) = inner.members.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|member| member.as_str() != participant)
            .map(|member| Presence {
                participant_id: member.clone(),
                name: inner.names.get(member).cloned(),
            })
            .collect()
    }

    /// Sets the participant's ephemeral display name.
    pub fn set_name(&self, participant: &str, name: &str) {
        self.inner
            .write()
            .names
            .insert(participant.to_owned(), name.to_owned());
    }

    /// The participant's display name, if one was announced.
    pub fn name(&self, participant: &str) -> Option<String> {
        self.inner.read().names.get(participant).cloned()
    }

    /// Delivers `frame` to every member of the participant's room
    /// except the participant itself.
    pub fn broadcast(&self, participant: &str, frame: &str) {
        let Some(room) = self.current_room(participant) else {
            return;
        };
        self.broadcast_room(&room, participant, frame);
    }

    /// Delivers `frame` to every member of `room` except `exclude`.
    pub fn broadcast_room(&self, room: &str, exclude: &str, frame: &str) {
        let recipients: Vec<(String, mpsc::Sender<String>)> = {
            let inner = self.inner.read();
            let Some(members) = inner.members.get(room) else {
                return;
            };
            members
                .iter()
                .filter(|member| member.as_str() != exclude)
                .filter_map(|member| {
                    inner
                        .senders
                        .get(member)
                        .map(|tx| (member.clone(), tx.clone()))
                })
                .collect()
        };

        for (member, tx) in recipients {
            // Slow or gone clients lose the frame, not the room.
            if let Err(e) = tx.try_send(frame.to_owned()) {
                debug!("Dropping frame for {member}: {e}");
            }
        }
    }

    /// Delivers `frame` to a single participant.
    pub fn send_to(&self, participant: &str, frame: &str) {
        let tx = self.inner.read().senders.get(participant).cloned();
        if let Some(tx) = tx {
            if let Err(e) = tx.try_send(frame.to_owned()) {
                debug!("Dropping frame for {participant}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence_ids(mut roommates: Vec<Presence>) -> Vec<String> {
        roommates.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        roommates.into_iter().map(|p| p.participant_id).collect()
    }

    #[test]
    fn join_moves_participant_between_rooms() {
        let registry = RoomRegistry::new();
        registry.join("p1", "/a");
        assert_eq!(registry.current_room("p1").as_deref(), Some("/a"));

        registry.join("p1", "/b");
        assert_eq!(registry.current_room("p1").as_deref(), Some("/b"));

        // p1 is gone from /a: a member of /a has no roommates left.
        registry.join("p2", "/a");
        assert!(registry.roommates("p2").is_empty());
    }

    #[test]
    fn rejoining_the_same_room_is_stable() {
        let registry = RoomRegistry::new();
        registry.join("p1", "/a");
        registry.join("p2", "/a");
        registry.join("p1", "/a");

        assert_eq!(registry.current_room("p1").as_deref(), Some("/a"));
        assert_eq!(presence_ids(registry.roommates("p2")), vec!["p1"]);
    }

    #[test]
    fn roommates_excludes_self_and_other_rooms() {
        let registry = RoomRegistry::new();
        registry.join("p1", "/a");
        registry.join("p2", "/a");
        registry.join("p3", "/b");

        assert_eq!(presence_ids(registry.roommates("p1")), vec!["p2"]);
        assert_eq!(presence_ids(registry.roommates("p2")), vec!["p1"]);
        assert!(registry.roommates("p3").is_empty());
    }

    #[test]
    fn roommates_carry_display_names() {
        let registry = RoomRegistry::new();
        registry.join("p1", "/a");
        registry.join("p2", "/a");
        registry.set_name("p2", "ada");

        let roommates = registry.roommates("p1");
        assert_eq!(roommates.len(), 1);
        assert_eq!(roommates[0].name.as_deref(), Some("ada"));
    }

    #[test]
    fn broadcast_reaches_roommates_only() {
        let registry = RoomRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let (tx3, mut rx3) = mpsc::channel(8);
        registry.register("p1", tx1);
        registry.register("p2", tx2);
        registry.register("p3", tx3);
        registry.join("p1", "/a");
        registry.join("p2", "/a");
        registry.join("p3", "/b");

        registry.broadcast("p1", "hello");

        assert_eq!(rx2.try_recv().unwrap(), "hello");
        assert!(rx1.try_recv().is_err());
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn broadcast_from_roomless_participant_goes_nowhere() {
        let registry = RoomRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        registry.register("p1", tx1);
        registry.join("p1", "/a");

        registry.broadcast("p2", "lost");
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn leave_drops_membership_name_and_channel() {
        let registry = RoomRegistry::new();
        let (tx, mut rx) = mpsc::channel(8);
        registry.register("p1", tx);
        registry.join("p1", "/a");
        registry.set_name("p1", "ada");

        assert_eq!(registry.leave("p1").as_deref(), Some("/a"));

        assert_eq!(registry.current_room("p1"), None);
        assert_eq!(registry.name("p1"), None);
        registry.send_to("p1", "gone");
        // The registry held the only sender; dropping it closed the channel.
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn leave_without_room_is_a_noop() {
        let registry = RoomRegistry::new();
        assert_eq!(registry.leave("p1"), None);
    }

    #[test]
    fn full_channel_drops_the_frame() {
        let registry = RoomRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.register("p1", tx);

        registry.send_to("p1", "one");
        registry.send_to("p1", "two");

        assert_eq!(rx.try_recv().unwrap(), "one");
        assert!(rx.try_recv().is_err());
    }
}
