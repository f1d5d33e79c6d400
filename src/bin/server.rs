// ABOUTME: Relay server binary
// ABOUTME: Standalone push-to-talk relay for the local network

use clap::Parser;
use squawk::server::{RelayServer, ServerArgs};

#[derive(Parser, Debug)]
#[command(name = "squawk-server")]
#[command(author, version, about = "Push-to-talk relay server", long_about = None)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    args.server.init_tracing();
    args.server.log_startup_info();

    let config = args.server.build_config();

    tracing::info!("Press Ctrl+C to stop");

    RelayServer::with_config(config).run().await
}
