// ABOUTME: WebSocket client connection to the relay server
// ABOUTME: Bounded automatic reconnect and event dispatch

use crate::audio::frame::AudioFrame;
use crate::protocol::messages::{Message, PttStatus, UserEntry};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Connection attempts before giving up silently.
pub const RECONNECT_ATTEMPTS: u32 = 5;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Something the relay told us, or a change in connection state.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The session channel is established
    Connected,
    /// Full roster snapshot from the server
    Roster(Vec<UserEntry>),
    /// Another participant toggled their talk state
    Status(PttStatus),
    /// One audio frame from another participant
    Frame(AudioFrame),
    /// A connection attempt or established session failed
    Error(String),
    /// The session channel closed; a bounded retry may follow
    Disconnected,
}

enum WsOut {
    Frame(Vec<u8>),
    Status(bool),
}

/// Handle to the relay connection.
///
/// Cheap to clone; sends are fire-and-forget and silently dropped while
/// the channel is down.
#[derive(Clone)]
pub struct Connection {
    out_tx: mpsc::UnboundedSender<WsOut>,
}

impl Connection {
    /// Open a connection to `url`, returning the handle and the event
    /// stream. The background task retries failed connections up to
    /// [`RECONNECT_ATTEMPTS`] times, then gives up silently by closing
    /// the event stream. Dropping every handle ends the task once the
    /// outbound queue has drained.
    pub fn open(url: String) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_connection(url, out_rx, event_tx));

        (Self { out_tx }, event_rx)
    }

    /// Send one captured audio frame as a `ptt-stream` event.
    pub fn send_frame(&self, frame: &AudioFrame) {
        let _ = self.out_tx.send(WsOut::Frame(frame.to_le_bytes()));
    }

    /// Send a `ptt-status` toggle; the server stamps our id on relay.
    pub fn send_status(&self, is_talking: bool) {
        let _ = self.out_tx.send(WsOut::Status(is_talking));
    }
}

async fn run_connection(
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<WsOut>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut attempts = 0;

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                attempts = 0;
                log::info!("Connected to {}", url);
                let _ = event_tx.send(ClientEvent::Connected);

                drive_session(ws, &mut out_rx, &event_tx).await;
                let _ = event_tx.send(ClientEvent::Disconnected);

                // All handles gone and the queue drained: nothing left to
                // reconnect for.
                if out_rx.is_closed() {
                    return;
                }
            }
            Err(e) => {
                log::warn!("Connection to {} failed: {}", url, e);
                let _ = event_tx.send(ClientEvent::Error(e.to_string()));
            }
        }

        attempts += 1;
        if attempts >= RECONNECT_ATTEMPTS || event_tx.is_closed() {
            // Retry budget exhausted: give up silently. Dropping the
            // event channel is the terminal signal to the consumer.
            return;
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

/// Pump one established session until it closes.
async fn drive_session(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    out_rx: &mut mpsc::UnboundedReceiver<WsOut>,
    event_tx: &mpsc::UnboundedSender<ClientEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    dispatch_text(&text, event_tx);
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    let frame = AudioFrame::from_le_bytes(&data);
                    let _ = event_tx.send(ClientEvent::Frame(frame));
                }
                Some(Ok(WsMessage::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                    return;
                }
            },
            out = out_rx.recv() => match out {
                Some(WsOut::Frame(bytes)) => {
                    if ws_tx.send(WsMessage::Binary(bytes)).await.is_err() {
                        return;
                    }
                }
                Some(WsOut::Status(is_talking)) => {
                    let msg = Message::PttStatus(PttStatus { id: None, is_talking });
                    match msg.to_json() {
                        Ok(json) => {
                            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => log::warn!("Failed to serialize ptt-status: {}", e),
                    }
                }
                None => return,
            },
        }
    }
}

fn dispatch_text(text: &str, event_tx: &mpsc::UnboundedSender<ClientEvent>) {
    match Message::from_json(text) {
        Ok(Message::UserList(users)) => {
            let _ = event_tx.send(ClientEvent::Roster(users));
        }
        Ok(Message::PttStatus(status)) => {
            let _ = event_tx.send(ClientEvent::Status(status));
        }
        Err(e) => {
            log::warn!("Failed to parse server message: {}", e);
        }
    }
}
