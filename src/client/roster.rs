// ABOUTME: Client-side roster state
// ABOUTME: Server membership overlaid with locally tracked talk flags

use crate::protocol::messages::UserEntry;
use std::collections::HashMap;

/// One participant as presented to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterUser {
    /// Session id
    pub id: String,
    /// Display name assigned by the server
    pub name: String,
    /// Whether this participant is currently talking
    pub is_talking: bool,
}

/// Reconciled view of the room.
///
/// The server's `user-list` is authoritative for membership only; talk
/// state arrives as a separate event stream and is kept as an overlay, so
/// a roster refresh does not reset who is currently talking. The two are
/// joined when read.
#[derive(Debug, Default)]
pub struct Roster {
    members: Vec<UserEntry>,
    talking: HashMap<String, bool>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace membership with a fresh snapshot. Talk flags for surviving
    /// members are preserved; flags for departed members are pruned.
    pub fn apply_user_list(&mut self, users: Vec<UserEntry>) {
        self.talking
            .retain(|id, _| users.iter().any(|u| &u.id == id));
        self.members = users;
    }

    /// Record a talk-status toggle for a participant.
    pub fn apply_status(&mut self, id: &str, is_talking: bool) {
        self.talking.insert(id.to_string(), is_talking);
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Membership joined with talk flags, in server order.
    pub fn users(&self) -> Vec<RosterUser> {
        self.members
            .iter()
            .map(|u| RosterUser {
                id: u.id.clone(),
                name: u.name.clone(),
                is_talking: self.talking.get(&u.id).copied().unwrap_or(false),
            })
            .collect()
    }
}
