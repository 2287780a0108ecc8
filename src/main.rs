//! gallery-orders server entry point.
//!
//! Loads configuration, picks the store, starts the notification
//! dispatcher and serves the REST API until Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use gallery_orders::api;
use gallery_orders::app_state::AppState;
use gallery_orders::config::MarketConfig;
use gallery_orders::domain::EventBus;
use gallery_orders::notify::{self, LogNotifier};
use gallery_orders::persistence::{MarketStore, MemoryStore, PostgresStore};

/// How long the dispatcher may take to drain queued events on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    init_tracing(config.log_json);
    tracing::info!(addr = %config.listen_addr, "starting gallery-orders");

    let store = open_store(&config).await?;
    let event_bus = EventBus::new(config.event_bus_capacity);
    let dispatcher = notify::spawn_dispatcher(
        &event_bus,
        Arc::new(LogNotifier),
        config.admin_notification_email.clone(),
    );

    let app_state = AppState::new(store, event_bus, &config);
    let app = api::build_app(app_state, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The app and every bus sender are gone; let the dispatcher drain.
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher).await.is_err() {
        tracing::warn!("notification dispatcher did not drain in time");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &MarketConfig) -> anyhow::Result<Arc<dyn MarketStore>> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    let store = PostgresStore::new(pool);
    store.migrate().await.context("failed to run migrations")?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "connected to PostgreSQL"
    );
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}
