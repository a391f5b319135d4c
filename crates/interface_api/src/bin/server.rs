//! LexDir - API Server Binary
//!
//! Starts the HTTP API server and the background queue re-driver.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin lexdir-api
//!
//! # Run with environment variables
//! API_HOST=0.0.0.0 API_PORT=8080 API_DATABASE_URL=postgres://... cargo run --bin lexdir-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_CMS_BASE_URL` - Base URL of the external CMS REST API
//! * `API_CMS_USERNAME` / `API_CMS_PASSWORD` - CMS Basic-Auth credentials
//! * `API_PUSH_TIMEOUT_SECS` - Upper bound on a single CMS push (default: 10)
//! * `API_RETRY_DELAY_SECS` - Delay before a failed push is re-driven (default: 300)
//! * `API_MAX_SYNC_ATTEMPTS` - Attempts before a queue entry dies (default: 5)
//! * `API_REDRIVE_INTERVAL_SECS` - Interval between re-drive passes (default: 60)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{ExternalAuthConfig, HealthCheckable};
use domain_sync::{ReDriver, SyncOrchestrator};
use infra_cms::{CmsAdapter, CmsConfig};
use infra_db::PostgresStoreAdapter;
use interface_api::{config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting LexDir API Server"
    );

    // Database pool + migrations
    let pool = infra_db::create_pool(&config.database_url).await?;
    infra_db::run_migrations(&pool).await?;

    // Explicitly constructed adapters, injected into the orchestrator
    let store = Arc::new(PostgresStoreAdapter::new(pool));
    let cms = Arc::new(CmsAdapter::new(CmsConfig {
        base_url: config.cms_base_url.clone(),
        auth: ExternalAuthConfig::Basic {
            username: config.cms_username.clone(),
            password: config.cms_password.clone(),
        },
        timeout_secs: config.push_timeout_secs,
    })?);
    let cms_health = cms.health_check().await;
    tracing::info!(
        status = ?cms_health.status,
        latency_ms = cms_health.latency_ms,
        message = cms_health.message.as_deref().unwrap_or(""),
        "CMS health probe"
    );

    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        cms.clone(),
        config.sync_config(),
    ));

    // Background re-driver for the retry queue
    let shutdown = CancellationToken::new();
    let redriver = ReDriver::new(store.clone(), orchestrator.clone());
    let redrive_interval = Duration::from_secs(config.redrive_interval_secs);
    let redriver_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { redriver.run(redrive_interval, shutdown).await }
    });

    let app = create_router(AppState::new(store, cms, orchestrator));

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    redriver_task.await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads API configuration from environment variables
///
/// Falls back to defaults for anything unset.
fn load_config() -> ApiConfig {
    ApiConfig::from_env().unwrap_or_else(|_| {
        let defaults = ApiConfig::default();
        ApiConfig {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("API_DATABASE_URL"))
                .unwrap_or(defaults.database_url),
            cms_base_url: std::env::var("API_CMS_BASE_URL").unwrap_or(defaults.cms_base_url),
            cms_username: std::env::var("API_CMS_USERNAME").unwrap_or(defaults.cms_username),
            cms_password: std::env::var("API_CMS_PASSWORD").unwrap_or(defaults.cms_password),
            push_timeout_secs: env_parse("API_PUSH_TIMEOUT_SECS", defaults.push_timeout_secs),
            retry_delay_secs: env_parse("API_RETRY_DELAY_SECS", defaults.retry_delay_secs),
            max_sync_attempts: env_parse("API_MAX_SYNC_ATTEMPTS", defaults.max_sync_attempts),
            redrive_interval_secs: env_parse(
                "API_REDRIVE_INTERVAL_SECS",
                defaults.redrive_interval_secs,
            ),
            log_level: std::env::var("API_LOG_LEVEL")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
        }
    })
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Initializes the tracing subscriber for structured logging
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
///
/// This enables graceful shutdown of the server, allowing in-flight
/// requests to complete before the process exits.
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
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
