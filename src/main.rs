//! Fedsearch Server
//!
//! Run with: cargo run --bin fedsearch -- [--config path]
//!
//! Serves the configured backend with the peer HTTP protocol. Without a
//! config file the default locations are tried, then environment
//! variables (`FEDSEARCH_*`) alone.

use clap::Parser;
use std::path::PathBuf;

use fedsearch::api::{serve, AppState};
use fedsearch::config::Config;
use fedsearch::search::registry;

#[derive(Parser)]
#[command(name = "fedsearch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search federation server")]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(port) = args.port {
        config.api.port = port;
    }

    fedsearch::init_logging(&config.logging);
    tracing::info!("Starting Fedsearch server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(available = ?registry::available_backends(), "Backend: {}", config.backend.name);

    let backend = registry::create(&config.backend.name, &config.backend.options)?;
    tracing::info!("Serving {}", backend);

    let state = AppState::new(backend, config.api.clone());
    serve(state, &config.api).await?;

    tracing::info!("Fedsearch server stopped");
    Ok(())
}
