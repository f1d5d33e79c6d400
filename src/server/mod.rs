// ABOUTME: Server module for the push-to-talk relay
// ABOUTME: Provides the WebSocket server, session hub, and registry

mod cli;
mod config;
mod hub;
mod registry;
mod server;
mod session;

pub use cli::ServerArgs;
pub use config::ServerConfig;
pub use hub::{spawn_hub, HubEvent, HubHandle};
pub use registry::{Participant, SessionRegistry};
pub use server::RelayServer;
pub use session::{handle_session, Outbound, SessionReceiver, SessionSender};
