//! Cadence - campaign dispatcher entry point

use anyhow::Result;
use cadence_api::AppState;
use cadence_common::config::Config;
use cadence_core::{CampaignManager, Dispatcher, SendGateway};
use cadence_storage::db::DatabasePool;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Cadence campaign dispatcher...");

    // Load configuration
    let config = Config::load()?;

    let timezone: Tz = config
        .scheduler
        .timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid timezone: {}", config.scheduler.timezone))?;

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    // Send gateway client
    let gateway = SendGateway::new(&config.gateway);

    // Command surface and dispatcher
    let manager = CampaignManager::new(db_pool.clone(), timezone);
    let dispatcher = Arc::new(Dispatcher::new(
        db_pool.clone(),
        gateway,
        timezone,
        &config.scheduler,
    ));

    // Start the periodic dispatcher scan
    let scan_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.run().await;
        })
    };

    // Start API server
    let api_handle = {
        let state = AppState {
            db_pool: db_pool.clone(),
            manager,
            dispatcher: dispatcher.clone(),
        };
        let bind = format!("{}:{}", config.server.bind_address, config.api.port);
        let enable_swagger = config.api.enable_swagger;
        tokio::spawn(async move {
            let app = cadence_api::create_router(state, enable_swagger);
            let listener = match tokio::net::TcpListener::bind(&bind).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!("Failed to bind API server on {}: {}", bind, e);
                    return;
                }
            };
            info!("Starting API server on {}", bind);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {}", e);
            }
        })
    };

    info!("Cadence started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    scan_handle.abort();
    api_handle.abort();

    info!("Cadence shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cadence=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
