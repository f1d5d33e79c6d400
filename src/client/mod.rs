// ABOUTME: Client module for connecting to a relay server
// ABOUTME: WebSocket transport with bounded reconnect, plus roster state

/// Relay connection with bounded reconnect
pub mod connection;
/// Reconciled roster and talk-state view
pub mod roster;

pub use connection::{ClientEvent, Connection};
pub use roster::{Roster, RosterUser};
