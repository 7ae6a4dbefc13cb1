mod bootstrap;

use anyhow::Result;
use kiosk_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use kiosk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    tracing::info!(
        event_name = "system.bot.started",
        database = %app.config.database.url,
        sessions = app.engine.active_sessions().await,
        "kiosk bot started"
    );

    app.runner.start().await?;

    wait_for_shutdown().await?;
    tracing::info!(event_name = "system.bot.stopping", "kiosk bot stopping");

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
