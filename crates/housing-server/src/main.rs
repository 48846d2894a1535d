//! # housing-server
//!
//! HTTP front end for the student housing application vault.
//!
//! This binary provides:
//! - **Public registration** endpoint that validates and stores applications
//! - **Admin API** (bearer token) for review, ranking, statistics and export
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod config;
mod error;
mod rate_limit;

use std::sync::Arc;

use housing_store::{Codec, Database, Vault};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,housing_server=debug")),
        )
        .init();

    info!("Starting housing server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        admin_enabled = config.admin_token.is_some(),
        sealed = config.vault_passphrase.is_some(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the vault
    // -----------------------------------------------------------------------
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?database.path(), "Opened database");

    let codec = match &config.vault_passphrase {
        Some(passphrase) => Codec::sealed(passphrase),
        None => Codec::Plain,
    };

    let vault = Vault::open(database, codec);
    info!(
        applications = vault.len(),
        capacity = vault.capacity(),
        "Vault loaded"
    );

    let rate_limiter = RateLimiter::from_config(&config);

    let app_state = AppState {
        vault: Arc::new(Mutex::new(vault)),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = rate_limiter.purge_idle(std::time::Duration::from_secs(600)).await;
            if purged > 0 {
                tracing::debug!(purged, "Purged idle rate limit buckets");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
