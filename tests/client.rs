// Client connection behavior over real sockets: bounded reconnect,
// session recovery, and outbound delivery through the relay.

use futures_util::StreamExt;
use squawk::audio::AudioFrame;
use squawk::client::connection::RECONNECT_ATTEMPTS;
use squawk::client::{ClientEvent, Connection};
use squawk::protocol::messages::Message;
use squawk::server::{RelayServer, ServerConfig};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};

type RawClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig::new("Test Relay");
    tokio::spawn(async move {
        RelayServer::with_config(config).serve(listener).await.unwrap();
    });

    format!("ws://{}/ptt", addr)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Option<ClientEvent> {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for client event")
}

async fn next_text(client: &mut RawClient) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("connection closed")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return Message::from_json(&text).unwrap();
        }
    }
}

async fn next_binary(client: &mut RawClient) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("websocket error");
        if let WsMessage::Binary(data) = msg {
            return data;
        }
    }
}

#[tokio::test]
async fn gives_up_after_bounded_retries() {
    // Grab a port that nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (_connection, mut events) = Connection::open(format!("ws://{}/ptt", addr));

    // One error per failed attempt, then the event stream closes. Closing
    // the stream is the only terminal signal.
    for attempt in 0..RECONNECT_ATTEMPTS {
        match next_event(&mut events).await {
            Some(ClientEvent::Error(_)) => {}
            other => panic!("attempt {}: expected error event, got {:?}", attempt, other),
        }
    }
    assert!(next_event(&mut events).await.is_none());
}

#[tokio::test]
async fn reconnects_after_the_server_drops_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // First session is cut right after the handshake; later ones stay up.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);

        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            tokio::spawn(async move { while ws.next().await.is_some() {} });
        }
    });

    let (_connection, mut events) = Connection::open(format!("ws://{}/ptt", addr));

    assert_eq!(next_event(&mut events).await, Some(ClientEvent::Connected));

    // An abrupt drop may surface as a read error before the disconnect.
    loop {
        match next_event(&mut events).await {
            Some(ClientEvent::Error(_)) => {}
            Some(ClientEvent::Disconnected) => break,
            other => panic!("expected disconnect, got {:?}", other),
        }
    }

    // A successful session resets the retry budget and is retried.
    assert_eq!(next_event(&mut events).await, Some(ClientEvent::Connected));
}

#[tokio::test]
async fn outbound_status_and_frames_reach_other_participants() {
    let url = start_server().await;

    let (connection, mut events) = Connection::open(url.clone());
    assert_eq!(next_event(&mut events).await, Some(ClientEvent::Connected));

    let our_id = match next_event(&mut events).await {
        Some(ClientEvent::Roster(users)) => users[0].id.clone(),
        other => panic!("expected roster, got {:?}", other),
    };

    let (mut observer, _) = connect_async(url.as_str()).await.unwrap();
    match next_event(&mut events).await {
        Some(ClientEvent::Roster(users)) => assert_eq!(users.len(), 2),
        other => panic!("expected roster, got {:?}", other),
    }
    match next_text(&mut observer).await {
        Message::UserList(users) => assert_eq!(users.len(), 2),
        other => panic!("expected user-list, got {:?}", other),
    }

    connection.send_status(true);
    match next_text(&mut observer).await {
        Message::PttStatus(status) => {
            assert_eq!(status.id.as_deref(), Some(our_id.as_str()));
            assert!(status.is_talking);
        }
        other => panic!("expected ptt-status, got {:?}", other),
    }

    let frame = AudioFrame::new(vec![0.5, -0.5, 0.25, -0.25]);
    connection.send_frame(&frame);
    assert_eq!(next_binary(&mut observer).await, frame.to_le_bytes());
}

#[tokio::test]
async fn queued_status_is_delivered_even_when_the_handle_drops() {
    let url = start_server().await;

    let (connection, mut events) = Connection::open(url.clone());
    assert_eq!(next_event(&mut events).await, Some(ClientEvent::Connected));
    match next_event(&mut events).await {
        Some(ClientEvent::Roster(_)) => {}
        other => panic!("expected roster, got {:?}", other),
    }

    let (mut observer, _) = connect_async(url.as_str()).await.unwrap();
    match next_text(&mut observer).await {
        Message::UserList(users) => assert_eq!(users.len(), 2),
        other => panic!("expected user-list, got {:?}", other),
    }

    // The final not-talking toggle at shutdown is queued just before the
    // handle goes away; the session task drains it before closing.
    connection.send_status(false);
    drop(connection);

    match next_text(&mut observer).await {
        Message::PttStatus(status) => assert!(!status.is_talking),
        other => panic!("expected ptt-status, got {:?}", other),
    }
}
