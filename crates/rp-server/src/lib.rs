//! rp-server: entitlement-gated media streaming over HTTP.
//!
//! This crate ties the rp-* crates into a running server. It provides:
//!
//! - the authorization evaluator deciding who may stream what
//! - a range-streaming responder over pluggable blob storage
//! - the order lifecycle controller and its payment gateway client
//! - the Axum router with authentication, rate limiting and request IDs

pub mod access;
pub mod blob;
pub mod context;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod payment;
pub mod range;
pub mod router;
pub mod routes;
pub mod streaming;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rp_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::blob::FsBlobStore;
use crate::context::AppContext;
use crate::payment::RazorpayGateway;

/// How often expired bearer tokens are purged.
const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Start the reelpass server.
///
/// Initializes the database, builds the [`AppContext`] and serves HTTP until
/// a shutdown signal is received.
pub async fn start(config: Config) -> rp_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let db_path = &config.server.db_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created database directory {}", parent.display());
        }
    }
    let db_str = db_path.to_string_lossy();
    let db = rp_db::pool::init_pool(&db_str)?;
    if existed {
        tracing::info!("Database opened (existing) at {db_str}");
    } else {
        tracing::info!("Database created (new) at {db_str}");
    }

    let media_dir = &config.storage.media_dir;
    if !media_dir.exists() {
        tracing::warn!(
            "Media directory {} does not exist; streams will fail until it does",
            media_dir.display()
        );
    }
    let blobs = Arc::new(FsBlobStore::new(media_dir.clone()));
    let gateway = Arc::new(RazorpayGateway::from_config(&config.payment)?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| rp_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(db, config, blobs, gateway);
    let cancel = CancellationToken::new();

    let sweeper = tokio::spawn(sweep_expired_tokens(ctx.db.clone(), cancel.clone()));

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| rp_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    let _ = sweeper.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Periodically delete expired bearer tokens until cancelled.
async fn sweep_expired_tokens(db: rp_db::pool::DbPool, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(TOKEN_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let db = db.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = rp_db::pool::get_conn(&db)?;
            rp_db::queries::auth::delete_expired_tokens(&conn, &rp_db::queries::now_timestamp())
        })
        .await;

        match result {
            Ok(Ok(0)) => {}
            Ok(Ok(n)) => tracing::debug!("Purged {n} expired tokens"),
            Ok(Err(e)) => tracing::warn!("Token sweep failed: {e}"),
            Err(e) => tracing::warn!("Token sweep task panicked: {e}"),
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
