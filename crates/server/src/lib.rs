pub mod bootstrap;
pub mod checkout;
pub mod health;
pub mod notify;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tantrata_core::analytics::AnalyticsEngine;
use tantrata_core::config::{AppConfig, LoadOptions, LogFormat};
use tantrata_core::events::SaleCompleted;
use tantrata_core::notify::{NoopNotifier, Notifier};
use tantrata_db::{DbPool, SqlProductRepository, SqlSalesRepository};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::checkout::RecommendationConsumer;
use crate::notify::LogNotifier;
use crate::routes::ApiState;

pub fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Health, analytics and checkout routes over one SQLite pool.
pub fn app(config: &AppConfig, db_pool: DbPool, events: mpsc::Sender<SaleCompleted>) -> Router {
    let sales = Arc::new(SqlSalesRepository::new(db_pool.clone()));
    let state = ApiState::new(
        Arc::new(SqlProductRepository::new(db_pool.clone())),
        sales.clone(),
        sales,
        AnalyticsEngine::from_config(&config.analytics),
        events,
    );

    routes::router(state).merge(health::router(db_pool))
}

fn notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    if !config.notification.enabled {
        return Ok(Arc::new(NoopNotifier));
    }
    let notifier = LogNotifier::new(&config.notification)
        .context("failed to compile the recommendation template")?;
    Ok(Arc::new(notifier))
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let application = bootstrap::bootstrap_with_config(config).await?;
    let config = application.config;

    let (sender, receiver) = mpsc::channel(config.server.event_buffer);
    let consumer = RecommendationConsumer::new(
        Arc::new(SqlSalesRepository::new(application.db_pool.clone())),
        AnalyticsEngine::from_config(&config.analytics),
        notifier(&config)?,
    )
    .spawn(receiver);

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        notifications = config.notification.enabled,
        "tantrata-server listening"
    );

    axum::serve(listener, app(&config, application.db_pool.clone(), sender))
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("http server terminated unexpectedly")?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "draining sale events"
    );
    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, consumer).await.is_err() {
        warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            grace_secs = config.server.graceful_shutdown_secs,
            "sale event consumer did not finish before the shutdown deadline"
        );
    }
    application.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
}
