//! Service-oriented application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state. Collaborators (entitlement store, blob store, payment
//! gateway) are injected as trait objects, so tests can swap any of them.

use std::sync::Arc;

use rp_core::config::Config;
use rp_db::pool::DbPool;
use rp_db::store::{EntitlementStore, SqliteEntitlementStore};

use crate::access::AccessEvaluator;
use crate::blob::BlobStore;
use crate::middleware::rate_limit::{create_limiter, SharedLimiter};
use crate::orders::{OrderController, OrderPolicy};
use crate::payment::PaymentGateway;

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool.
    pub db: DbPool,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    pub blobs: Arc<dyn BlobStore>,
    pub access: AccessEvaluator,
    pub orders: OrderController,
    /// Shared quota for the order routes.
    pub order_limiter: SharedLimiter,
}

impl AppContext {
    /// Wire the evaluator and controller over a SQLite-backed store.
    pub fn new(
        db: DbPool,
        config: Config,
        blobs: Arc<dyn BlobStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let store: Arc<dyn EntitlementStore> = Arc::new(SqliteEntitlementStore::new(db.clone()));
        let access = AccessEvaluator::new(store.clone());
        let orders = OrderController::new(store, gateway, OrderPolicy::from(&config.payment));
        let order_limiter = create_limiter(config.rate_limit.orders_per_minute);

        Self {
            db,
            config: Arc::new(config),
            blobs,
            access,
            orders,
            order_limiter,
        }
    }
}
