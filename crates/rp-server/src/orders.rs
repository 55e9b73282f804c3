//! Order lifecycle: checkout, payment confirmation and cancellation.
//!
//! Orders move `Pending -> Paid` or `Pending -> Failed`; both targets are
//! terminal. Only a confirmed payment produces a Paid order, and only a Paid
//! order unlocks streaming.

use std::sync::Arc;

use rp_core::config::PaymentConfig;
use rp_core::{to_minor_units, AssetId, Error, Identity, OrderId, Result};
use rp_db::models::{Asset, Order};
use rp_db::store::{EntitlementStore, PaymentOutcome, PaymentRecord};
use serde::{Deserialize, Serialize};

use crate::payment::{new_receipt, ChargeRequest, GatewayOrder, PaymentGateway};

/// Catalog and payment rules applied by the controller.
#[derive(Debug, Clone)]
pub struct OrderPolicy {
    pub currency: String,
    /// Whether zero-priced assets can be checked out.
    pub allow_free: bool,
    /// Whether confirmations must carry a valid gateway signature.
    pub require_signature: bool,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            currency: "INR".into(),
            allow_free: false,
            require_signature: true,
        }
    }
}

impl From<&PaymentConfig> for OrderPolicy {
    fn from(c: &PaymentConfig) -> Self {
        Self {
            currency: c.currency.clone(),
            allow_free: c.allow_free,
            require_signature: c.require_signature,
        }
    }
}

/// Asset fields echoed back on checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AssetSummary {
    #[schema(value_type = String)]
    pub id: AssetId,
    pub title: String,
    pub price: i64,
}

impl From<&Asset> for AssetSummary {
    fn from(a: &Asset) -> Self {
        Self {
            id: a.id,
            title: a.title.clone(),
            price: a.price,
        }
    }
}

/// Result of [`OrderController::initiate`].
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Checkout {
    #[schema(value_type = String)]
    pub order_id: OrderId,
    pub gateway_order: GatewayOrder,
    pub asset: AssetSummary,
}

/// A client's assertion that a payment completed.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ConfirmPayment {
    #[schema(value_type = String)]
    pub asset_id: AssetId,
    pub payment_ref: String,
    #[serde(default)]
    pub gateway_order_id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Clone)]
pub struct OrderController {
    store: Arc<dyn EntitlementStore>,
    gateway: Arc<dyn PaymentGateway>,
    policy: OrderPolicy,
}

impl OrderController {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        gateway: Arc<dyn PaymentGateway>,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            policy,
        }
    }

    /// Open a checkout for `asset_id` with the gateway and record it as a
    /// Pending order. Nothing is written if the gateway call fails.
    pub async fn initiate(&self, identity: &Identity, asset_id: AssetId) -> Result<Checkout> {
        let asset = self
            .store
            .get_asset(asset_id)?
            .ok_or_else(|| Error::not_found("asset", asset_id))?;

        if asset.price < 0 || (asset.price == 0 && !self.policy.allow_free) {
            return Err(Error::InvalidAmount(format!(
                "asset {} is priced at {}",
                asset.id, asset.price
            )));
        }
        let amount_minor = to_minor_units(asset.price).ok_or_else(|| {
            Error::InvalidAmount(format!("price {} overflows minor units", asset.price))
        })?;

        let gateway_order = self
            .gateway
            .create_charge(ChargeRequest {
                amount_minor,
                currency: self.policy.currency.clone(),
                receipt: new_receipt(),
            })
            .await?;

        let order = self.store.open_order(
            identity.user_id,
            &asset,
            &gateway_order.id,
            &self.policy.currency,
        )?;

        tracing::info!(
            order_id = %order.id,
            user_id = %identity.user_id,
            asset_id = %asset.id,
            gateway_order_id = %gateway_order.id,
            "Checkout opened"
        );

        Ok(Checkout {
            order_id: order.id,
            gateway_order,
            asset: AssetSummary::from(&asset),
        })
    }

    /// Record a completed payment and return the Paid order.
    ///
    /// A retry with the same payment reference returns the order it already
    /// produced. When signatures are required the payment can only settle the
    /// caller's own Pending checkout for this asset.
    pub async fn confirm(&self, identity: &Identity, req: ConfirmPayment) -> Result<Order> {
        let payment_ref = req.payment_ref.trim();
        if payment_ref.is_empty() {
            return Err(Error::MissingReference);
        }

        if self.store.get_asset(req.asset_id)?.is_none() {
            return Err(Error::not_found("asset", req.asset_id));
        }

        let gateway_order_id = req
            .gateway_order_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if self.policy.require_signature {
            let verified = match (gateway_order_id, req.signature.as_deref()) {
                (Some(gid), Some(sig)) => self.gateway.verify_payment(gid, payment_ref, sig),
                _ => false,
            };
            if !verified {
                tracing::warn!(
                    user_id = %identity.user_id,
                    asset_id = %req.asset_id,
                    "Payment signature rejected"
                );
                return Err(Error::InvalidSignature);
            }
        }

        let outcome = self.store.record_payment(&PaymentRecord {
            user_id: identity.user_id,
            asset_id: req.asset_id,
            payment_ref,
            gateway_order_id,
            currency: &self.policy.currency,
            checkout_required: self.policy.require_signature,
        })?;

        match &outcome {
            PaymentOutcome::AlreadyRecorded(o) => {
                tracing::debug!(order_id = %o.id, "Payment already recorded")
            }
            PaymentOutcome::Settled(o) | PaymentOutcome::Inserted(o) => tracing::info!(
                order_id = %o.id,
                user_id = %o.user_id,
                asset_id = %o.asset_id,
                amount = o.amount,
                "Payment recorded"
            ),
        }

        Ok(outcome.into_order())
    }

    /// Abandon the caller's Pending order.
    pub fn cancel(&self, identity: &Identity, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .get_order(order_id)?
            .filter(|o| o.user_id == identity.user_id)
            .ok_or_else(|| Error::not_found("order", order_id))?;

        if !order.status.is_open() || !self.store.abandon_order(order.id)? {
            return Err(Error::Conflict(format!(
                "order {} is not pending",
                order.id
            )));
        }

        tracing::info!(order_id = %order.id, "Checkout cancelled");
        self.store
            .get_order(order.id)?
            .ok_or_else(|| Error::not_found("order", order.id))
    }

    /// Fetch an order visible to the caller (owner or admin).
    pub fn get(&self, identity: &Identity, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)?
            .filter(|o| identity.may_view_owned_by(o.user_id))
            .ok_or_else(|| Error::not_found("order", order_id))
    }

    /// The caller's orders, newest first.
    pub fn list(&self, identity: &Identity) -> Result<Vec<Order>> {
        self.store.orders_for_user(identity.user_id)
    }
}
