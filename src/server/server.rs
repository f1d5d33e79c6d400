// ABOUTME: Main relay server implementation
// ABOUTME: Provides the WebSocket endpoint and static asset fallback

use crate::server::config::ServerConfig;
use crate::server::hub::{spawn_hub, HubHandle};
use crate::server::session::handle_session;
use axum::{
    extract::ws::WebSocketUpgrade,
    extract::State,
    response::IntoResponse,
    routing::any,
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

/// Shared application state
#[derive(Clone)]
struct AppState {
    /// Handle into the relay hub
    hub: HubHandle,
}

/// The relay server: one WebSocket endpoint fanning audio and talk-status
/// events between all connected sessions, with an optional static asset
/// fallback for the web UI.
pub struct RelayServer {
    /// Server configuration
    config: Arc<ServerConfig>,
}

impl RelayServer {
    /// Create a new relay server with default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new relay server with custom configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and run until Ctrl-C.
    ///
    /// Failing to bind is the one fatal server condition; it aborts
    /// startup with the bind address in the diagnostic.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let bind_addr = self.config.bind_addr;
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| format!("failed to bind {}: {}", bind_addr, e))?;
        self.serve(listener).await
    }

    /// Run the server on an already-bound listener (used by tests to bind
    /// an ephemeral port).
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let config = self.config.clone();

        let (hub, hub_task) = spawn_hub();
        let state = AppState { hub };

        let mut app = Router::new()
            .route(&config.ws_path, any(ws_handler))
            .with_state(state);

        // Any request that is not the ws endpoint serves the application
        // shell, so client-side routes resolve on refresh.
        if let Some(dir) = &config.serve_dir {
            let index = dir.join("index.html");
            app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
        }

        log::info!(
            "{} listening on {} (endpoint: {})",
            config.name,
            listener.local_addr()?,
            config.ws_path
        );

        let shutdown_signal = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for Ctrl-C");
            log::info!("Received shutdown signal");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        hub_task.abort();

        log::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state.hub))
}
