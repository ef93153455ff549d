//! finboard - realtime dashboard backend entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// finboard realtime dashboard backend
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FINBOARD_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any wss:// connection
    finboard_stream::init_crypto();

    let args = Args::parse();

    finboard_telemetry::init_logging()?;

    info!("Starting finboard v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > FINBOARD_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("FINBOARD_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = finboard_app::AppConfig::from_file(&config_path)?;
    info!(
        data_dir = %config.persistence.data_dir.display(),
        port = config.dashboard.port,
        "Configuration loaded"
    );

    let app = finboard_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
