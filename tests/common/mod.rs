//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, a temporary media
//! directory, a fake payment gateway, and a full [`AppContext`]. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rp_core::config::Config;
use rp_core::{Error, Identity, Result, Role};
use rp_db::models::Asset;
use rp_db::pool::{init_memory_pool, DbPool};
use rp_server::blob::FsBlobStore;
use rp_server::context::AppContext;
use rp_server::payment::{
    sign_payment, verify_payment_signature, ChargeRequest, GatewayOrder, PaymentGateway,
};
use rp_server::router::build_router;

/// Secret the fake gateway signs and verifies with.
pub const GATEWAY_SECRET: &str = "harness_secret";

/// In-process gateway: hands out sequential order ids, or fails on demand.
#[derive(Default)]
pub struct FakeGateway {
    pub fail: std::sync::atomic::AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<GatewayOrder> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Gateway("503 Service Unavailable".into()));
        }
        Ok(GatewayOrder {
            id: format!("order_test_{n}"),
            amount: request.amount_minor,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: Some("created".into()),
        })
    }

    fn verify_payment(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(GATEWAY_SECRET, gateway_order_id, payment_id, signature)
    }
}

/// Signature the fake gateway accepts for this order/payment pair.
pub fn signature_for(gateway_order_id: &str, payment_id: &str) -> String {
    sign_payment(GATEWAY_SECRET, gateway_order_id, payment_id)
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub gateway: Arc<FakeGateway>,
    pub media: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration. The media
    /// directory is always a fresh temp dir.
    pub fn with_config(mut config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let media = tempfile::tempdir().expect("failed to create media dir");
        config.storage.media_dir = media.path().to_path_buf();

        let gateway = Arc::new(FakeGateway::default());
        let blobs = Arc::new(FsBlobStore::new(media.path()));
        let ctx = AppContext::new(db.clone(), config, blobs, gateway.clone());

        Self {
            ctx,
            db,
            gateway,
            media,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> rp_db::pool::PooledConnection {
        rp_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }

    /// Create a user and a long-lived bearer token. Returns the identity and
    /// the token.
    pub fn create_user(&self, username: &str, role: Role) -> (Identity, String) {
        let conn = self.conn();
        let user = rp_db::queries::users::create_user(&conn, username, role).unwrap();
        let token = format!("tok_{username}");
        rp_db::queries::auth::create_token(&conn, user.id, &token, "2999-01-01T00:00:00Z")
            .unwrap();
        (user.identity(), token)
    }

    /// Write `bytes` under the media dir and register an asset for it.
    pub fn create_asset(&self, key: &str, price: i64, bytes: &[u8]) -> Asset {
        let path = self.media.path().join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        self.register_asset(key, price)
    }

    /// Register an asset without writing any bytes for it.
    pub fn register_asset(&self, key: &str, price: i64) -> Asset {
        let conn = self.conn();
        rp_db::queries::assets::create_asset(&conn, "Test film", "", price, key).unwrap()
    }

    /// Record a Paid order directly.
    pub fn mark_purchased(&self, who: &Identity, asset: &Asset, payment_ref: &str) {
        let conn = self.conn();
        rp_db::queries::orders::insert_paid_order(
            &conn,
            who.user_id,
            asset.id,
            payment_ref,
            asset.price,
            "INR",
        )
        .unwrap();
    }
}

/// Deterministic test payload: byte `i` is `i % 251`.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
