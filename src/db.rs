//! Database connection management
//!
//! Builds the connection pool the graph source introspects through.

pub mod queries;

use crate::connection::ConnectionParams;
use crate::error::AppError;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::info;

/// Create a connection pool, with TLS when the target requires it
pub fn create_pool(params: &ConnectionParams, max_pool_size: usize) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(params.host.clone());
    cfg.port = Some(params.port);
    cfg.user = Some(params.user.clone());
    cfg.password = Some(params.password.clone());
    cfg.dbname = Some(params.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_pool_size.max(1)));

    if params.use_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| AppError::Config(format!("Failed to create TLS pool: {}", e)))
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))
    }
}

/// Run a trivial query to make sure the pool can reach the database
pub async fn verify_connection(pool: &Pool, params: &ConnectionParams) -> Result<(), AppError> {
    let client = pool.get().await?;
    client.query_one("SELECT 1 AS ok", &[]).await?;

    info!(
        "✅ Database connection successful: {} (TLS: {})",
        params.to_display_string(),
        params.use_tls
    );
    Ok(())
}
