use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod analysis;
mod api;
mod cache;
mod config;
mod db;
mod error;
mod extraction;
mod i18n;
mod llm;
mod rate_limit;
mod render;
mod service;

use crate::config::{RuntimeConfig, load_static_config};
use crate::db::Database;
use crate::service::SimplifierService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting Linguagem Simples service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Static configuration decides where the database lives
    let static_config = load_static_config()?;

    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        "Static configuration loaded"
    );

    // Ensure data directory exists
    std::fs::create_dir_all(&static_config.storage.data_dir)?;

    // Initialize database
    let db_path = static_config.storage.data_dir.join("linguagem.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    // Load runtime config (static + dynamic with DB overrides)
    let runtime_config = Arc::new(RuntimeConfig::load(static_config, &db)?);
    info!("Runtime configuration loaded with DB settings");

    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder unavailable, /metrics will be empty");
            None
        }
    };

    // Initialize the service
    let service = Arc::new(SimplifierService::new(db, runtime_config.clone())?);

    // Build the router
    let app = api::router(service.clone(), prometheus);

    // Cache expiry, limiter cleanup and history retention
    let maintenance_service = service.clone();
    tokio::spawn(async move {
        loop {
            let interval = maintenance_service
                .runtime_config
                .dynamic()
                .cache
                .sweep_interval();
            tokio::time::sleep(interval).await;

            let report = maintenance_service.run_maintenance();
            if report.cache_entries_removed > 0 || report.history_rows_removed > 0 {
                info!(
                    cache_entries = report.cache_entries_removed,
                    history_rows = report.history_rows_removed,
                    "Maintenance removed stale data"
                );
            }
        }
    });

    // Start the server
    let addr = format!(
        "{}:{}",
        runtime_config.static_config.server.host, runtime_config.static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("linguagem_simples_service=info,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
