// ABOUTME: Per-connection WebSocket session handling
// ABOUTME: Outbound queues with drop-oldest audio and reliable control

use crate::protocol::messages::Message;
use crate::server::hub::HubHandle;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use crossbeam::queue::ArrayQueue;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Audio frames buffered per session before the oldest is dropped.
/// Staleness is worse than loss for live audio, so a stalled receiver
/// loses old frames instead of throttling the sender.
const AUDIO_QUEUE_FRAMES: usize = 8;

/// A message on its way out to one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON control text (roster, status)
    Control(String),
    /// Binary audio frame payload
    Audio(Vec<u8>),
}

/// Hub-side handle to one session's outbound queues.
///
/// Control traffic rides a small reliable channel; audio frames ride a
/// bounded drop-oldest queue. Both sends are fire-and-forget: delivery
/// failure is never surfaced to the sending participant.
#[derive(Debug, Clone)]
pub struct SessionSender {
    control_tx: mpsc::UnboundedSender<String>,
    audio: Arc<ArrayQueue<Vec<u8>>>,
    notify: Arc<Notify>,
}

impl SessionSender {
    /// Create a sender/receiver pair with the given audio queue capacity.
    pub fn channel(audio_capacity: usize) -> (SessionSender, SessionReceiver) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let audio = Arc::new(ArrayQueue::new(audio_capacity));
        let notify = Arc::new(Notify::new());

        (
            SessionSender {
                control_tx,
                audio: Arc::clone(&audio),
                notify: Arc::clone(&notify),
            },
            SessionReceiver {
                control_rx,
                audio,
                notify,
            },
        )
    }

    /// Queue a control message; skipped if the session writer is gone.
    pub fn send_control(&self, json: String) {
        let _ = self.control_tx.send(json);
    }

    /// Queue an audio frame, evicting the oldest when full.
    pub fn send_audio(&self, payload: Vec<u8>) {
        if self.audio.force_push(payload).is_some() {
            log::debug!("Session audio queue full, dropped oldest frame");
        }
        self.notify.notify_one();
    }
}

/// Session-side consumer of the outbound queues.
#[derive(Debug)]
pub struct SessionReceiver {
    control_rx: mpsc::UnboundedReceiver<String>,
    audio: Arc<ArrayQueue<Vec<u8>>>,
    notify: Arc<Notify>,
}

impl SessionReceiver {
    /// Next outbound message, audio first. Returns `None` once the hub
    /// has dropped this session and all control traffic is drained.
    pub async fn recv(&mut self) -> Option<Outbound> {
        loop {
            if let Some(payload) = self.audio.pop() {
                return Some(Outbound::Audio(payload));
            }
            tokio::select! {
                msg = self.control_rx.recv() => return msg.map(Outbound::Control),
                _ = self.notify.notified() => continue,
            }
        }
    }

    /// Non-blocking variant used in tests.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        if let Some(payload) = self.audio.pop() {
            return Some(Outbound::Audio(payload));
        }
        self.control_rx.try_recv().ok().map(Outbound::Control)
    }
}

/// Handle one WebSocket session for its whole lifetime.
///
/// Registration happens immediately on upgrade (connect is implicit in
/// the original protocol); every inbound message becomes a hub event, and
/// closing the socket for any reason deregisters the session.
pub async fn handle_session(socket: WebSocket, hub: HubHandle) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (sender, mut outbound) = SessionSender::channel(AUDIO_QUEUE_FRAMES);
    hub.connect(session_id.clone(), sender);

    // Forward outbound queue traffic to the WebSocket
    let session_id_send = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let ws_msg = match msg {
                Outbound::Control(text) => WsMessage::Text(text.into()),
                Outbound::Audio(data) => WsMessage::Binary(data.into()),
            };
            if ws_tx.send(ws_msg).await.is_err() {
                log::debug!("Session {} disconnected (send failed)", session_id_send);
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Binary(data)) => {
                // ptt-stream: relayed without validating size or content
                hub.audio(session_id.clone(), data.to_vec());
            }
            Ok(WsMessage::Text(text)) => {
                handle_text_message(&text, &session_id, &hub);
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                // Handled automatically by axum
            }
            Ok(WsMessage::Close(_)) => {
                log::info!("Session {} closed connection", session_id);
                break;
            }
            Err(e) => {
                log::warn!("WebSocket error for session {}: {}", session_id, e);
                break;
            }
        }
    }

    hub.disconnect(session_id.clone());
    send_task.abort();

    log::info!("Session {} ended", session_id);
}

fn handle_text_message(text: &str, session_id: &str, hub: &HubHandle) {
    match Message::from_json(text) {
        Ok(Message::PttStatus(status)) => {
            // Whatever id the sender claimed is discarded; the hub stamps
            // the session's own id on relay.
            hub.status(session_id.to_string(), status.is_talking);
        }
        Ok(other) => {
            log::debug!("Unhandled message from {}: {:?}", session_id, other);
        }
        Err(e) => {
            log::warn!("Failed to parse message from {}: {}", session_id, e);
        }
    }
}
