//! # tillguardd: tillguard daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`tillguard.toml` + `TILLGUARD_*` env vars)
//! - Initialize logging from the configured filter
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repositories, the credential cipher and the vendor adapters
//! - Construct the integration service, injecting adapters via port traits
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, no domain logic belongs here.

mod config;

use tracing_subscriber::EnvFilter;

use tillguard_adapter_http_axum::state::AppState;
use tillguard_adapter_providers::VendorRegistry;
use tillguard_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteIntegrationLogRepository, SqliteIntegrationRepository,
    SqlitePosEventStore,
};
use tillguard_adapter_vault::XChaCha20Poly1305Cipher;
use tillguard_app::error_tracker::TracingErrorTracker;
use tillguard_app::services::{CredentialVault, IntegrationLogger, IntegrationService};

use crate::config::{Config, KeyMode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    if config.vault.key_mode == KeyMode::Session {
        tracing::warn!(
            "vault key mode is `session`: stored credentials become unreadable when the session changes"
        );
    }

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let integration_repo = SqliteIntegrationRepository::new(pool.clone());
    let log_repo = SqliteIntegrationLogRepository::new(pool.clone());
    let event_store = SqlitePosEventStore::new(pool);

    // Vendors
    let providers = VendorRegistry::from_config(&config.providers, &config.http)?;

    // Services
    let cipher = XChaCha20Poly1305Cipher::new(config.key_source()?);
    let vault = CredentialVault::new(integration_repo, cipher);
    let logger = IntegrationLogger::new(log_repo, TracingErrorTracker);
    let integrations = IntegrationService::new(vault, logger, event_store, providers)
        .with_anomaly_rules(config.anomaly.clone())
        .with_retry_policy(config.retry.policy());

    // HTTP
    let app = tillguard_adapter_http_axum::router::build(AppState::new(integrations));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "tillguardd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("tillguardd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
