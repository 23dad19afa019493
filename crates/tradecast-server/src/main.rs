//! Tradecast server entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Trade ingestion and re-streaming server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRADECAST_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: its telemetry section decides the default log level.
    let config_path = args
        .config
        .or_else(|| std::env::var("TRADECAST_CONFIG").ok());
    let config = match &config_path {
        Some(path) => tradecast_server::AppConfig::from_file(path)?,
        None => tradecast_server::AppConfig::load()?,
    };

    tradecast_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting tradecast v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = config_path {
        info!(config_path = %path, "Loaded configuration");
    }

    let app = tradecast_server::Application::new(config)?;
    app.run().await?;

    Ok(())
}
