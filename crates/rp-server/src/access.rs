//! Authorization evaluator: may this identity receive this asset's bytes?

use std::sync::Arc;

use rp_core::{AssetId, Error, Identity, Result};
use rp_db::models::Asset;
use rp_db::store::EntitlementStore;

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Administrative override.
    Override,
    /// A Paid order exists for the pair.
    Purchased,
    Denied,
}

impl Decision {
    pub fn is_granted(self) -> bool {
        !matches!(self, Decision::Denied)
    }

    fn as_str(self) -> &'static str {
        match self {
            Decision::Override => "override",
            Decision::Purchased => "purchased",
            Decision::Denied => "denied",
        }
    }
}

/// Decides streaming access from the entitlement store.
#[derive(Clone)]
pub struct AccessEvaluator {
    store: Arc<dyn EntitlementStore>,
}

impl AccessEvaluator {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self { store }
    }

    /// Evaluate access and return the asset with the decision.
    ///
    /// Asset existence and the purchase check are read together, so a
    /// payment committing concurrently is either fully visible or not at all.
    pub fn evaluate(&self, identity: &Identity, asset_id: AssetId) -> Result<(Asset, Decision)> {
        let snapshot = self
            .store
            .access_snapshot(identity.user_id, asset_id)?
            .ok_or_else(|| Error::not_found("asset", asset_id))?;

        let decision = if identity.has_override() {
            Decision::Override
        } else if snapshot.has_paid_order {
            Decision::Purchased
        } else {
            Decision::Denied
        };

        tracing::debug!(
            user_id = %identity.user_id,
            asset_id = %asset_id,
            decision = decision.as_str(),
            "Access evaluated"
        );

        Ok((snapshot.asset, decision))
    }

    /// Whether `identity` may stream `asset_id`. Side-effect free.
    pub fn can_stream(&self, identity: &Identity, asset_id: AssetId) -> Result<bool> {
        let (_, decision) = self.evaluate(identity, asset_id)?;
        Ok(decision.is_granted())
    }

    /// Gate for the streaming route: the asset on grant, `Forbidden` on deny.
    pub fn authorize_stream(&self, identity: &Identity, asset_id: AssetId) -> Result<Asset> {
        match self.evaluate(identity, asset_id)? {
            (asset, d) if d.is_granted() => Ok(asset),
            _ => Err(Error::Forbidden("payment required".into())),
        }
    }
}
