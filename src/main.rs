//! SchemaGraph API - browsable dependency graph of a database schema
//!
//! Introspects tables, views, procedures and functions of the configured
//! database, keeps the resulting graph in a short-lived cache, and serves
//! flattened dependency trees in either direction.

mod config;
mod connection;
mod db;
mod error;
mod graph;
mod introspection;
mod models;
mod routes;
mod service;
mod state;

use crate::config::Settings;
use crate::connection::ConnectionParams;
use crate::introspection::PostgresGraphSource;
use crate::routes::create_router;
use crate::service::SchemaService;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting SchemaGraph API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let environment = settings
        .database
        .active_environment()
        .ok_or_else(|| anyhow::anyhow!("No active database environment configured"))?;

    let params = ConnectionParams::from_connection_string(&environment.url)?;
    let pool = db::create_pool(&params, settings.database.max_pool_size)?;

    // An unreachable database is not fatal: graph requests answer 503 until it comes back
    if let Err(e) = db::verify_connection(&pool, &params).await {
        warn!(
            "⚠️  Database '{}' not reachable at startup: {}",
            environment.name, e
        );
    }

    let source = PostgresGraphSource::new(pool, environment.name.clone());
    let schema = SchemaService::new(Arc::new(source), settings.cache.lifetime());
    info!(
        "🗂️  Schema graph cache lifetime: {} min (environment: {})",
        settings.cache.lifetime_minutes, environment.name
    );

    let state = Arc::new(AppState::new(schema, &settings.database));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  /health                        - Health check");
    info!("   GET  /api/schema/graph              - Summary of the cached graph");
    info!("   GET  /api/schema/autocomplete       - Object list (?filter=&q=)");
    info!("   GET  /api/schema/dependencytree     - Flattened tree (?objName=&direction=)");
    info!("   GET  /api/schema/definition         - Object source (?objName=)");
    info!("   GET  /api/schema/environments       - Configured environments");
    info!("   POST /api/schema/refresh            - Reload the graph now");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemagraph_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
