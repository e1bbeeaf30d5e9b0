use std::future::{pending, IntoFuture};
use std::time::Duration;

use anyhow::Result;
use medvoice_core::config::{AppConfig, LoadOptions};
use medvoice_server::{bootstrap_with_config, router};
use tokio::sync::oneshot;
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use medvoice_core::config::LogFormat::*;
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

async fn run() -> Result<()> {
    // Logging must exist before bootstrap emits anything.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "medvoice-server listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let server = axum::serve(listener, router(app.state.clone(), &app.config.server.cors_origin))
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            match signalled_rx.await {
                Ok(()) => tokio::time::sleep(drain).await,
                Err(_) => pending::<()>().await,
            }
        } => {
            warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                drain_secs = drain.as_secs(),
                "in-flight requests did not finish before the drain deadline"
            );
        }
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "medvoice-server stopping"
    );
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        pending::<()>().await;
    }
}
