//! Listing Cache - HTTP server
//!
//! Serves listing reads through the cache, the read-model sync endpoint and
//! the cache debug surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_cache::api::{create_router, AppState};
use listing_cache::bootstrap::Documents;
use listing_cache::cache::{cache_version, CacheMetrics};
use listing_cache::readmodel::PublicUrlResolver;
use listing_cache::{spawn_cleanup_task, Backends, Config};

/// Main entry point for the listing cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables (fails fast on a
///    misconfigured document store)
/// 3. Connect the key-value backend, or fall back to in-memory
/// 4. Start the expiry sweep when running in-memory
/// 5. Connect the document store (aborts when configured but unreachable)
/// 6. Create Axum router with all endpoints
/// 7. Start HTTP server on configured port
/// 8. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting listing cache server");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        "Configuration loaded: port={}, default_ttl={}s, redis={}, document_db={}, env={}",
        config.server_port,
        config.default_ttl,
        config.redis_url.is_some(),
        config.document_store_db,
        config.app_env
    );

    let backends = Backends::connect(&config).await;
    let metrics = Arc::new(CacheMetrics::new());
    let cache = Arc::new(backends.cache(metrics));
    info!(
        backend = backends.kv.backend_name(),
        version = cache_version(),
        "Cache initialized"
    );

    let cleanup_handle = backends
        .memory
        .clone()
        .map(|memory| spawn_cleanup_task(memory, config.cleanup_interval));

    let documents = Documents::connect(&config)
        .await
        .context("document store unavailable")?;
    let resolver = Arc::new(
        PublicUrlResolver::new(config.storage_public_url.as_deref())
            .context("invalid STORAGE_PUBLIC_URL")?,
    );
    let state = AppState::with_documents(
        cache,
        documents,
        resolver,
        Arc::new(backends.rate_limiter()),
        &config,
    );

    if state.settings.sync_secret.is_none() {
        warn!("SYNC_SECRET not set, sync and admin endpoints will reject every request");
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep.
async fn shutdown_signal(cleanup_handle: Option<tokio::task::JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Expiry sweep aborted");
    }
}
