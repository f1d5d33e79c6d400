// ABOUTME: Session registry of connected participants
// ABOUTME: Insertion-ordered roster owned exclusively by the relay hub

use crate::protocol::messages::UserEntry;

/// One connected device's identity and talk-state record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Opaque session identifier, unique while any session is alive
    pub id: String,
    /// Display name derived from the session id
    pub name: String,
    /// Talk flag; updated only from this participant's own status events
    pub is_talking: bool,
}

impl Participant {
    /// Roster entry for a `user-list` broadcast.
    pub fn entry(&self) -> UserEntry {
        UserEntry {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// In-memory set of active sessions, in insertion order.
///
/// The registry is owned by the relay hub and mutated only from its
/// serialized event loop, so no locking is involved: events applied in
/// arrival order are the whole consistency story. Every id present
/// corresponds to exactly one live session; absence means the session is
/// gone.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    participants: Vec<Participant>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
        }
    }

    /// Register a new session, deriving a human-readable default name
    /// from the session id. Returns the created participant.
    pub fn add(&mut self, session_id: &str) -> Participant {
        let short: String = session_id.chars().take(4).collect();
        let participant = Participant {
            id: session_id.to_string(),
            name: format!("Device {}", short),
            is_talking: false,
        };
        self.participants.push(participant.clone());
        participant
    }

    /// Remove a session if present; idempotent.
    pub fn remove(&mut self, session_id: &str) {
        self.participants.retain(|p| p.id != session_id);
    }

    /// Update a participant's talk flag; no-op for unknown ids, which is
    /// a benign race between disconnect and status events.
    pub fn set_talking(&mut self, session_id: &str, is_talking: bool) {
        if let Some(participant) = self.participants.iter_mut().find(|p| p.id == session_id) {
            participant.is_talking = is_talking;
        }
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Current roster in insertion order, for broadcast.
    pub fn snapshot(&self) -> Vec<UserEntry> {
        self.participants.iter().map(Participant::entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_derives_display_name() {
        let mut registry = SessionRegistry::new();
        let participant = registry.add("a1b2c3d4-rest-of-uuid");
        assert_eq!(participant.name, "Device a1b2");
        assert!(!participant.is_talking);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut registry = SessionRegistry::new();
        registry.add("first");
        registry.add("second");
        registry.add("third");
        registry.remove("second");
        registry.add("fourth");

        let ids: Vec<String> = registry.snapshot().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["first", "third", "fourth"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = SessionRegistry::new();
        registry.add("only");
        registry.remove("only");
        registry.remove("only");
        registry.remove("never-existed");
        assert!(registry.is_empty());
    }

    #[test]
    fn set_talking_ignores_unknown_ids() {
        let mut registry = SessionRegistry::new();
        registry.add("known");
        registry.set_talking("known", true);
        registry.set_talking("gone", true);

        assert_eq!(registry.len(), 1);
    }
}
