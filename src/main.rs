// ABOUTME: Push-to-talk client binary
// ABOUTME: Connects to a relay, toggles the mic on a key, plays received audio

use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use futures_util::StreamExt;
use squawk::audio::{CapturePipeline, PlaybackEngine};
use squawk::client::{ClientEvent, Connection, Roster};

#[derive(Parser, Debug)]
#[command(name = "squawk")]
#[command(author, version, about = "Push-to-talk client", long_about = None)]
struct Args {
    /// Relay server WebSocket URL
    #[arg(short, long, default_value = "ws://localhost:3000/ptt")]
    server: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose { "squawk=debug" } else { "squawk=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tracing::info!("Connecting to {}...", args.server);
    let (connection, mut events) = Connection::open(args.server.clone());

    // Playback is best effort: a machine without an output device can
    // still transmit.
    let playback = match PlaybackEngine::start() {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!("Playback disabled: {}", e);
            None
        }
    };

    let mut roster = Roster::new();
    let mut capture: Option<CapturePipeline> = None;

    crossterm::terminal::enable_raw_mode()?;
    let mut keys = EventStream::new();
    tracing::info!("Press 't' to toggle talking, 'q' to quit");

    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::Connected) => {
                    tracing::info!("Connected");
                }
                Some(ClientEvent::Roster(users)) => {
                    roster.apply_user_list(users);
                    print_roster(&roster);
                }
                Some(ClientEvent::Status(status)) => {
                    if let Some(id) = status.id {
                        roster.apply_status(&id, status.is_talking);
                        print_roster(&roster);
                    }
                }
                Some(ClientEvent::Frame(frame)) => {
                    if let Some(engine) = &playback {
                        engine.play_frame(&frame);
                    }
                }
                Some(ClientEvent::Error(msg)) => {
                    tracing::warn!("Connection error: {}", msg);
                }
                Some(ClientEvent::Disconnected) => {
                    tracing::warn!("Disconnected");
                }
                None => {
                    // Retry budget exhausted; nothing more will arrive.
                    break Ok(());
                }
            },
            key = keys.next() => match key {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    match key.code {
                        KeyCode::Char('t') | KeyCode::Char(' ') => {
                            toggle_talking(&mut capture, &connection);
                        }
                        KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
                        _ => {}
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
                None => break Ok(()),
            },
        }
    };

    if let Some(mut pipeline) = capture.take() {
        pipeline.stop();
        connection.send_status(false);
        // The toggle is queued to the session task; give it a moment to
        // reach the wire before the runtime tears down.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    crossterm::terminal::disable_raw_mode()?;

    result
}

/// Start or stop a talk burst.
///
/// On start: the mic is acquired first, then the status toggle is queued
/// ahead of any frame (the outbound channel preserves order). A capture
/// failure is reported and leaves us not talking, with nothing half-open.
/// On stop: capture teardown is synchronous (device released on return),
/// then the status toggle goes out.
fn toggle_talking(capture: &mut Option<CapturePipeline>, connection: &Connection) {
    if let Some(mut pipeline) = capture.take() {
        pipeline.stop();
        connection.send_status(false);
        tracing::info!("Stopped talking");
        return;
    }

    let (frame_tx, mut frame_rx) = tokio::sync::mpsc::unbounded_channel();
    match CapturePipeline::start(frame_tx) {
        Ok(pipeline) => {
            connection.send_status(true);
            let conn = connection.clone();
            tokio::spawn(async move {
                while let Some(frame) = frame_rx.recv().await {
                    conn.send_frame(&frame);
                }
            });
            *capture = Some(pipeline);
            tracing::info!("Talking (press 't' again to stop)");
        }
        Err(e) => {
            tracing::error!("Could not access microphone: {}", e);
        }
    }
}

fn print_roster(roster: &Roster) {
    let line: Vec<String> = roster
        .users()
        .iter()
        .map(|u| {
            if u.is_talking {
                format!("{} [talking]", u.name)
            } else {
                u.name.clone()
            }
        })
        .collect();
    tracing::info!("Room ({}): {}", roster.len(), line.join(", "));
}
