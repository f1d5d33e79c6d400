// ABOUTME: Shared CLI argument parsing and server builder utilities
// ABOUTME: Consolidates startup plumbing for the server binary

use crate::server::ServerConfig;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Common server arguments
///
/// Use with `#[command(flatten)]` in your binary's Args struct:
/// ```ignore
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     server: ServerArgs,
/// }
/// ```
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Server name
    #[arg(short, long, default_value = "Squawk Relay")]
    pub name: String,

    /// WebSocket endpoint path
    #[arg(long, default_value = "/ptt")]
    pub path: String,

    /// Directory of built web UI assets to serve alongside the relay
    #[arg(long)]
    pub serve_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    /// Initialize tracing based on verbosity flag
    pub fn init_tracing(&self) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let filter = if self.verbose {
            "squawk=debug,tower_http=debug"
        } else {
            "squawk=info"
        };

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| filter.into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Log startup information
    pub fn log_startup_info(&self) {
        tracing::info!("Squawk Relay v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("Bind: {}", self.bind);
        tracing::info!("Endpoint: ws://{}{}", self.bind, self.path);
        if let Some(dir) = &self.serve_dir {
            tracing::info!("Serving static assets from {}", dir.display());
        }
    }

    /// Build ServerConfig from these args
    pub fn build_config(&self) -> ServerConfig {
        let config = ServerConfig::new(&self.name)
            .bind_addr(self.bind)
            .ws_path(self.path.clone());

        match &self.serve_dir {
            Some(dir) => config.serve_dir(dir.clone()),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = ServerArgs {
            bind: "0.0.0.0:3000".parse().unwrap(),
            name: "Test Relay".to_string(),
            path: "/ptt".to_string(),
            serve_dir: None,
            verbose: false,
        };

        assert_eq!(args.bind.port(), 3000);
        assert_eq!(args.path, "/ptt");
    }

    #[test]
    fn test_build_config() {
        let args = ServerArgs {
            bind: "127.0.0.1:9000".parse().unwrap(),
            name: "Custom Relay".to_string(),
            path: "/custom".to_string(),
            serve_dir: Some(PathBuf::from("dist")),
            verbose: false,
        };

        let config = args.build_config();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.ws_path, "/custom");
        assert!(config.serve_dir.is_some());
    }
}
