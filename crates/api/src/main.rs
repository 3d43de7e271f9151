//! Door Watch - Main Entry Point

use std::path::PathBuf;

use api::{init_logging, run_server, AppConfig};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "door-watch")]
#[command(version, about = "Watches a door through a camera and hides the desktop while it is open")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }

    init_logging(&config.logging)?;

    info!("=== Door Watch v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Camera: {:?}, window backend: {:?}", config.camera.source, config.windows.backend);

    run_server(config).await?;

    Ok(())
}
