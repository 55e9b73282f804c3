//! Razorpay orders API client.

use std::time::Duration;

use async_trait::async_trait;
use rp_core::config::PaymentConfig;
use rp_core::{Error, Result};
use serde::Serialize;

use super::{verify_payment_signature, ChargeRequest, GatewayOrder, PaymentGateway};

/// Longest slice of an error body carried into [`Error::Gateway`].
const BODY_EXCERPT: usize = 200;

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

pub struct RazorpayGateway {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(
        api_base: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    /// Build from the `payment` config section. Missing credentials are
    /// allowed here; charges then fail with a gateway error.
    pub fn from_config(config: &PaymentConfig) -> Result<Self> {
        Self::new(
            config.provider_url.clone(),
            config.key_id.clone().unwrap_or_default(),
            config.key_secret.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    fn has_credentials(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<GatewayOrder> {
        if !self.has_credentials() {
            return Err(Error::Gateway("payment credentials are not configured".into()));
        }

        let url = format!("{}/v1/orders", self.api_base);
        let body = CreateOrderBody {
            amount: request.amount_minor,
            currency: &request.currency,
            receipt: &request.receipt,
            payment_capture: 1,
        };

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(BODY_EXCERPT).collect();
            tracing::warn!(status = %status, "Gateway rejected order creation");
            return Err(Error::Gateway(format!("{status}: {excerpt}")));
        }

        let order = resp
            .json::<GatewayOrder>()
            .await
            .map_err(|e| Error::Gateway(format!("unreadable order response: {e}")))?;

        tracing::info!(
            gateway_order_id = %order.id,
            amount = order.amount,
            currency = %order.currency,
            "Gateway order created"
        );
        Ok(order)
    }

    fn verify_payment(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, gateway_order_id, payment_id, signature)
    }
}
