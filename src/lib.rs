// ABOUTME: Main library entry point for squawk
// ABOUTME: Exports the relay server, client transport, and audio pipeline

//! # squawk
//!
//! Low-latency LAN push-to-talk voice relay over WebSockets.
//!
//! Any connected device can hold a key to transmit live audio to every
//! other connected device. The server is a stateless-per-event relay: it
//! tracks who is connected, fans audio frames out to everyone except the
//! sender, and stamps talk-status events with the sender's id. The client
//! side captures 16 kHz mono PCM, slices it into fixed frames, and
//! schedules incoming frames for gap-free playback behind a small jitter
//! lookahead.
//!
//! ## Example: Running a Server
//!
//! ```no_run
//! use squawk::server::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::new("My Relay")
//!         .bind_addr("0.0.0.0:3000".parse().unwrap());
//!
//!     RelayServer::with_config(config).run().await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

/// Audio frames, capture pipeline, and playback scheduling
pub mod audio;
/// Client-side transport and roster state
pub mod client;
/// Wire protocol messages for the session channel
pub mod protocol;
/// Relay server: session hub, registry, and fan-out
pub mod server;

pub use audio::frame::AudioFrame;
pub use protocol::messages::{Message, PttStatus, UserEntry};
pub use server::{RelayServer, ServerConfig};

/// Sample rate for all capture and playback, in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Samples per audio frame (~256 ms at 16 kHz).
pub const FRAME_SAMPLES: usize = 4096;

/// Result type for squawk operations
pub type Result<T> = std::result::Result<T, error::Error>;

/// Error types for squawk
pub mod error {
    use thiserror::Error;

    /// Error types for squawk operations
    #[derive(Error, Debug)]
    pub enum Error {
        /// WebSocket-related error
        #[error("WebSocket error: {0}")]
        WebSocket(String),

        /// Protocol violation or parsing error
        #[error("Protocol error: {0}")]
        Protocol(String),

        /// Connection-related error
        #[error("Connection error: {0}")]
        Connection(String),

        /// Microphone capture error
        #[error("Capture error: {0}")]
        Capture(String),

        /// Audio output error
        #[error("Playback error: {0}")]
        Playback(String),
    }
}
