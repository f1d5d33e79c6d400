// ABOUTME: Wire protocol module
// ABOUTME: JSON control messages exchanged over the session channel

/// Control message definitions and serialization
pub mod messages;

pub use messages::{Message, PttStatus, UserEntry};
