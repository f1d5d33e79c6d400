// ABOUTME: Server configuration
// ABOUTME: Defines configurable parameters for the relay server

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// WebSocket endpoint path
    pub ws_path: String,
    /// Server name for logging
    pub name: String,
    /// Unique server identifier
    pub server_id: String,
    /// Directory of static web UI assets; any non-ws request falls back
    /// to its `index.html` for client-side routing
    pub serve_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Create a new server configuration with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the WebSocket path
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Set the static asset directory
    pub fn serve_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.serve_dir = Some(dir.into());
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".parse().unwrap(),
            ws_path: "/ptt".to_string(),
            name: "Squawk Relay".to_string(),
            server_id: uuid::Uuid::new_v4().to_string(),
            serve_dir: None,
        }
    }
}
