// ABOUTME: Relay hub owning the session registry and fan-out logic
// ABOUTME: Single serialized event loop; sessions feed it via one channel

use crate::protocol::messages::{Message, PttStatus};
use crate::server::registry::SessionRegistry;
use crate::server::session::SessionSender;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An inbound transport event, as seen by the hub.
#[derive(Debug)]
pub enum HubEvent {
    /// A new session was established
    Connect {
        /// Session identifier
        session_id: String,
        /// Outbound channel to this session
        sender: SessionSender,
    },
    /// An audio frame arrived from a session
    Audio {
        /// Sending session
        session_id: String,
        /// Raw frame payload, relayed verbatim
        payload: Vec<u8>,
    },
    /// A talk-status toggle arrived from a session
    Status {
        /// Sending session
        session_id: String,
        /// New talk flag
        is_talking: bool,
    },
    /// A session closed, explicitly or by transport failure
    Disconnect {
        /// Closed session
        session_id: String,
    },
}

/// Handle for feeding events into the hub.
///
/// Every session pushes its events through this single channel, which is
/// what serializes registry mutation: the hub task handles one event to
/// completion before the next, so the roster needs no locks.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    /// Register a new session and trigger a roster broadcast.
    pub fn connect(&self, session_id: String, sender: SessionSender) {
        let _ = self.tx.send(HubEvent::Connect { session_id, sender });
    }

    /// Relay an audio frame to every other session.
    pub fn audio(&self, session_id: String, payload: Vec<u8>) {
        let _ = self.tx.send(HubEvent::Audio {
            session_id,
            payload,
        });
    }

    /// Relay a talk-status toggle to every other session.
    pub fn status(&self, session_id: String, is_talking: bool) {
        let _ = self.tx.send(HubEvent::Status {
            session_id,
            is_talking,
        });
    }

    /// Remove a session and trigger a roster broadcast.
    pub fn disconnect(&self, session_id: String) {
        let _ = self.tx.send(HubEvent::Disconnect { session_id });
    }
}

/// Spawn the relay hub task. The task runs until every [`HubHandle`] is
/// dropped.
pub fn spawn_hub() -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_hub(rx));
    (HubHandle { tx }, handle)
}

async fn run_hub(mut rx: mpsc::UnboundedReceiver<HubEvent>) {
    let mut registry = SessionRegistry::new();
    let mut senders: HashMap<String, SessionSender> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match event {
            HubEvent::Connect { session_id, sender } => {
                let participant = registry.add(&session_id);
                senders.insert(session_id, sender);
                log::info!(
                    "Session {} connected as '{}', total sessions: {}",
                    participant.id,
                    participant.name,
                    registry.len()
                );
                broadcast_roster(&registry, &senders);
            }
            HubEvent::Audio {
                session_id,
                payload,
            } => {
                // Verbatim fan-out, sender excluded. Frame contents are
                // not validated; unreachable targets are skipped.
                for (id, sender) in &senders {
                    if *id != session_id {
                        sender.send_audio(payload.clone());
                    }
                }
            }
            HubEvent::Status {
                session_id,
                is_talking,
            } => {
                // Stateless per-event relay: the flag is stamped with the
                // sender's id but not stored, so a fresh connector learns
                // who is talking only at the next toggle.
                let msg = Message::PttStatus(PttStatus {
                    id: Some(session_id.clone()),
                    is_talking,
                });
                if let Ok(json) = msg.to_json() {
                    for (id, sender) in &senders {
                        if *id != session_id {
                            sender.send_control(json.clone());
                        }
                    }
                }
            }
            HubEvent::Disconnect { session_id } => {
                registry.remove(&session_id);
                if senders.remove(&session_id).is_some() {
                    log::info!(
                        "Session {} disconnected, total sessions: {}",
                        session_id,
                        registry.len()
                    );
                }
                broadcast_roster(&registry, &senders);
            }
        }
    }
}

/// Send the full roster snapshot to all sessions, the new or departing
/// one included, so every client converges after each membership change.
fn broadcast_roster(registry: &SessionRegistry, senders: &HashMap<String, SessionSender>) {
    let msg = Message::UserList(registry.snapshot());
    if let Ok(json) = msg.to_json() {
        for sender in senders.values() {
            sender.send_control(json.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::Message;
    use crate::server::session::{Outbound, SessionReceiver};

    async fn expect_roster(rx: &mut SessionReceiver) -> Vec<String> {
        match rx.recv().await {
            Some(Outbound::Control(json)) => match Message::from_json(&json).unwrap() {
                Message::UserList(users) => users.into_iter().map(|u| u.id).collect(),
                other => panic!("expected user-list, got {:?}", other),
            },
            other => panic!("expected control message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn roster_tracks_membership() {
        let (hub, _task) = spawn_hub();

        let (tx_a, mut rx_a) = SessionSender::channel(8);
        hub.connect("aaaa".to_string(), tx_a);
        assert_eq!(expect_roster(&mut rx_a).await, vec!["aaaa"]);

        let (tx_b, mut rx_b) = SessionSender::channel(8);
        hub.connect("bbbb".to_string(), tx_b);
        assert_eq!(expect_roster(&mut rx_a).await, vec!["aaaa", "bbbb"]);
        assert_eq!(expect_roster(&mut rx_b).await, vec!["aaaa", "bbbb"]);

        hub.disconnect("aaaa".to_string());
        assert_eq!(expect_roster(&mut rx_b).await, vec!["bbbb"]);
    }

    #[tokio::test]
    async fn audio_is_relayed_to_everyone_but_the_sender() {
        let (hub, _task) = spawn_hub();

        let (tx_a, mut rx_a) = SessionSender::channel(8);
        let (tx_b, mut rx_b) = SessionSender::channel(8);
        let (tx_c, mut rx_c) = SessionSender::channel(8);
        hub.connect("aaaa".to_string(), tx_a);
        hub.connect("bbbb".to_string(), tx_b);
        hub.connect("cccc".to_string(), tx_c);

        // Drain roster broadcasts: A sees 3, B sees 2, C sees 1.
        for _ in 0..3 {
            expect_roster(&mut rx_a).await;
        }
        for _ in 0..2 {
            expect_roster(&mut rx_b).await;
        }
        expect_roster(&mut rx_c).await;

        hub.audio("aaaa".to_string(), vec![1, 2, 3, 4]);
        hub.status("aaaa".to_string(), true);

        assert_eq!(rx_b.recv().await, Some(Outbound::Audio(vec![1, 2, 3, 4])));
        assert_eq!(rx_c.recv().await, Some(Outbound::Audio(vec![1, 2, 3, 4])));

        // A must not have received its own frame: the next thing A sees
        // is nothing at all (its queues stay empty).
        assert!(rx_a.try_recv().is_none());
    }

    #[tokio::test]
    async fn status_is_stamped_with_sender_id() {
        let (hub, _task) = spawn_hub();

        let (tx_a, mut rx_a) = SessionSender::channel(8);
        let (tx_b, mut rx_b) = SessionSender::channel(8);
        hub.connect("aaaa".to_string(), tx_a);
        hub.connect("bbbb".to_string(), tx_b);
        expect_roster(&mut rx_a).await;
        expect_roster(&mut rx_a).await;
        expect_roster(&mut rx_b).await;

        hub.status("aaaa".to_string(), true);

        match rx_b.recv().await {
            Some(Outbound::Control(json)) => match Message::from_json(&json).unwrap() {
                Message::PttStatus(status) => {
                    assert_eq!(status.id.as_deref(), Some("aaaa"));
                    assert!(status.is_talking);
                }
                other => panic!("expected ptt-status, got {:?}", other),
            },
            other => panic!("expected control message, got {:?}", other),
        }

        // Sender is excluded from its own status relay.
        assert!(rx_a.try_recv().is_none());
    }

    #[tokio::test]
    async fn three_session_end_to_end_scenario() {
        let (hub, _task) = spawn_hub();

        let (tx_a, mut rx_a) = SessionSender::channel(8);
        let (tx_b, mut rx_b) = SessionSender::channel(8);
        let (tx_c, mut rx_c) = SessionSender::channel(8);
        hub.connect("aaaa".to_string(), tx_a);
        hub.connect("bbbb".to_string(), tx_b);
        hub.connect("cccc".to_string(), tx_c);

        // After C connects, everyone's latest roster has 3 entries.
        for _ in 0..2 {
            expect_roster(&mut rx_a).await;
        }
        let latest_a = expect_roster(&mut rx_a).await;
        expect_roster(&mut rx_b).await;
        let latest_b = expect_roster(&mut rx_b).await;
        let latest_c = expect_roster(&mut rx_c).await;
        assert_eq!(latest_a, vec!["aaaa", "bbbb", "cccc"]);
        assert_eq!(latest_b, latest_a);
        assert_eq!(latest_c, latest_a);

        hub.audio("aaaa".to_string(), vec![9, 9, 9, 9]);
        assert_eq!(rx_b.recv().await, Some(Outbound::Audio(vec![9, 9, 9, 9])));
        assert_eq!(rx_c.recv().await, Some(Outbound::Audio(vec![9, 9, 9, 9])));

        hub.disconnect("aaaa".to_string());
        assert_eq!(expect_roster(&mut rx_b).await, vec!["bbbb", "cccc"]);
        assert_eq!(expect_roster(&mut rx_c).await, vec!["bbbb", "cccc"]);
    }
}
