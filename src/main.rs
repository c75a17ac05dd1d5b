//! Dashboard sharing settings server.
//!
//! ```text
//!   client ──HTTP──▶ http::server ──▶ SharingService ──▶ SharingSettingsStore ──▶ options
//!                        │                  │
//!                      admin          ModuleRegistry ◀── config watcher
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dashboard_sharing::config::{load_config, ConfigWatcher, ServerConfig};
use dashboard_sharing::lifecycle::{build_service, spawn_signal_handler, Shutdown};
use dashboard_sharing::observability::{logging, metrics};
use dashboard_sharing::HttpServer;

#[derive(Parser)]
#[command(name = "dashboard-sharing")]
#[command(about = "Serve dashboard sharing settings", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dashboard-sharing starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        modules = config.modules.len(),
        roles = config.roles.len(),
        auth = config.admin.api_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let service = Arc::new(build_service(&config)?);

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(updates))
        }
        None => (None, None),
    };

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, service);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
