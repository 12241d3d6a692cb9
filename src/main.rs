use anyhow::{Context, Result};
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use config::{AppConfig, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    init_logging(cfg.log_file.as_deref())?;
    tracing::debug!("Starting asset-organizer with config: {:?}", cfg);

    match command {
        Command::Organize => handlers::organize::organize(&cfg).await,
        Command::Clean { yes } => handlers::clean::clean(&cfg, yes).await,
        Command::History { limit } => handlers::history::history(&cfg, limit).await,
        Command::SampleData { products } => {
            handlers::sample_data::sample_data(&cfg, &products).await
        }
    }
}

/// Console logging filtered by `RUST_LOG` (default `info`), optionally
/// duplicated into a plain-text log file.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
