//! hearthd — the hearth gateway server binary.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hearth_core::config::HearthConfig;
use hearth_server::HearthCore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// IoT gateway: terminates device and user connections and routes events
/// between them.
#[derive(Parser, Debug)]
#[command(name = "hearthd", about = "hearth IoT gateway server")]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the mesh listener port.
    #[arg(long)]
    mesh_port: Option<u16>,

    /// Override the raw TCP listener port.
    #[arg(long)]
    tcp_port: Option<u16>,

    /// Override the WebSocket listener port.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Override the store database path.
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = HearthConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.mesh_port {
        config.mesh.listen_port = port;
    }
    if let Some(port) = cli.tcp_port {
        config.tcp.listen_port = port;
    }
    if let Some(port) = cli.ws_port {
        config.ws.port = port;
    }
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    let core = HearthCore::with_sqlite(config)?;
    core.install_default_routers();
    core.start_transports().await?;

    let mesh_addr = core
        .mesh()
        .map(|m| m.server().local_addr().to_string())
        .unwrap_or_default();
    let tcp_addr = core
        .tcp()
        .map(|t| t.local_addr().to_string())
        .unwrap_or_default();
    let ws_addr = core
        .ws()
        .map(|w| w.local_addr().to_string())
        .unwrap_or_default();
    info!(mesh = %mesh_addr, tcp = %tcp_addr, ws = %ws_addr, "hearth gateway running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting");
    Ok(())
}
