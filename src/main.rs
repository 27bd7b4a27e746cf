use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use cosmos_predictions::config::{mask_api_key, Config};
use cosmos_predictions::error::Result;
use cosmos_predictions::predictions::PredictionEngine;
use cosmos_predictions::server::{app, AppState};

#[derive(Parser)]
#[command(name = "cosmos-predictions")]
#[command(about = "Web service that turns a question into three AI-generated future scenarios", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "cosmos.toml")]
    config: PathBuf,

    /// Bind address, overriding the configured one
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::builder()
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Seconds))
        .format_module_path(true)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }

    if config.has_api_key() {
        info!(
            "starting with model {} and API key {}",
            config.model,
            mask_api_key(&config.api_key)
        );
    } else {
        info!(
            "starting without an API key, credential mode {:?}",
            config.credential_mode
        );
    }

    let engine = PredictionEngine::from_config(&config)?;
    let state = Arc::new(AppState::new(engine, &config));

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!("listening on {}", config.addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
