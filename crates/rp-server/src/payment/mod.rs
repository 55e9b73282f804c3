//! Payment gateway boundary.
//!
//! The order controller only sees [`PaymentGateway`]; [`razorpay`] provides
//! the HTTP implementation.

pub mod razorpay;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rp_core::Result;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub use razorpay::RazorpayGateway;

type HmacSha256 = Hmac<Sha256>;

/// A charge to be opened with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    /// Amount in the currency's minor unit.
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
}

/// The gateway's handle for an opened charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// External payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a charge. Failures are [`rp_core::Error::Gateway`].
    async fn create_charge(&self, request: ChargeRequest) -> Result<GatewayOrder>;

    /// Check a client-asserted payment against the gateway's signature.
    fn verify_payment(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Receipt label for a new charge.
pub fn new_receipt() -> String {
    format!("rcpt_{}", chrono::Utc::now().timestamp_millis())
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"` keyed by `secret`.
pub fn sign_payment(secret: &str, gateway_order_id: &str, payment_id: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature over `"{order_id}|{payment_id}"`.
pub fn verify_payment_signature(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());

    let expected = match hex::decode(signature.trim()) {
        Ok(b) => b,
        Err(_) => return false,
    };

    mac.verify_slice(&expected).is_ok()
}
