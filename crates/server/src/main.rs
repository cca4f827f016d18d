mod bootstrap;
mod cli;
mod health;

use anyhow::Result;
use clap::Parser;
use kampe_core::config::AppConfig;
use kampe_core::ApplicationError;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use kampe_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(cli.load_options())?;

    if cli.command() == Command::Config {
        println!("{}", cli::render_config(&config));
        return Ok(());
    }

    init_logging(&config);
    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState::new(app.cache.clone()),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "kampe relay started"
    );

    tokio::select! {
        outcome = app.runner.start() => {
            if let Err(runner_error) = outcome {
                let failure = ApplicationError::from(runner_error);
                tracing::error!(
                    event_name = "system.server.fatal",
                    correlation_id = "polling",
                    fatal = failure.is_fatal(),
                    error = %failure,
                    "telegram polling stopped"
                );
                return Err(failure.into());
            }
            tracing::info!(
                event_name = "system.server.stream_closed",
                correlation_id = "polling",
                "telegram update stream closed"
            );
        }
        signal = wait_for_shutdown() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "kampe relay stopping"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
