mod bootstrap;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use helpline_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use helpline_core::config::LogFormat::*;
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

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "helpline-server listening"
    );

    let state = routes::AppState::new(app.router.clone(), app.catalog.clone(), app.ledger.clone());
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let notify = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, routes::router(state))
            .with_graceful_shutdown(async move { notify.notified().await })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                "graceful drain exceeded budget, exiting"
            );
        }
    }

    tracing::info!(event_name = "system.server.stopped", "helpline-server stopped");
    Ok(())
}
