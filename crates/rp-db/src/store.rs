//! The entitlement store: the single source of truth for who has paid for
//! what.
//!
//! [`EntitlementStore`] is the capability handed to the access evaluator
//! and the order controller. [`SqliteEntitlementStore`] implements it on top
//! of the r2d2 pool; every method that must observe or produce a consistent
//! state does so in a single statement or a single IMMEDIATE transaction.

use rusqlite::TransactionBehavior;
use rp_core::{AssetId, Error, OrderId, Result, UserId};

use crate::models::{Asset, Order};
use crate::pool::{get_conn, DbPool};
use crate::queries::{assets, orders};

/// An asset together with whether a given user holds a Paid order for it,
/// read at one point in time.
#[derive(Debug, Clone)]
pub struct AccessSnapshot {
    pub asset: Asset,
    pub has_paid_order: bool,
}

/// A payment confirmation to be persisted.
#[derive(Debug, Clone)]
pub struct PaymentRecord<'a> {
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub payment_ref: &'a str,
    /// Gateway order handle from a previous checkout, if the client has one.
    pub gateway_order_id: Option<&'a str>,
    pub currency: &'a str,
    /// Only settle an existing Pending checkout; never insert a fresh Paid
    /// row.
    pub checkout_required: bool,
}

/// What [`EntitlementStore::record_payment`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// A Pending order from a previous checkout moved to Paid.
    Settled(Order),
    /// No checkout existed; a new Paid order was inserted.
    Inserted(Order),
    /// The payment reference was already recorded for this user and asset.
    AlreadyRecorded(Order),
}

impl PaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Settled(o) | Self::Inserted(o) | Self::AlreadyRecorded(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Settled(o) | Self::Inserted(o) | Self::AlreadyRecorded(o) => o,
        }
    }
}

/// Durable record of the catalog and of purchases.
pub trait EntitlementStore: Send + Sync {
    /// Look up an asset.
    fn get_asset(&self, id: AssetId) -> Result<Option<Asset>>;

    /// Read an asset and the user's paid-order flag atomically.
    fn access_snapshot(&self, user_id: UserId, asset_id: AssetId)
        -> Result<Option<AccessSnapshot>>;

    /// Persist a Pending order for a checkout handed to the gateway. The
    /// amount is frozen from `asset.price`.
    fn open_order(
        &self,
        user_id: UserId,
        asset: &Asset,
        gateway_order_id: &str,
        currency: &str,
    ) -> Result<Order>;

    /// Persist a confirmed payment. Must be serializable with respect to
    /// concurrent calls.
    fn record_payment(&self, record: &PaymentRecord<'_>) -> Result<PaymentOutcome>;

    /// Look up an order.
    fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// List a user's orders, newest first.
    fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Move a Pending order to Failed. Returns false if it was not Pending.
    fn abandon_order(&self, id: OrderId) -> Result<bool>;
}

/// [`EntitlementStore`] backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteEntitlementStore {
    pool: DbPool,
}

impl SqliteEntitlementStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl EntitlementStore for SqliteEntitlementStore {
    fn get_asset(&self, id: AssetId) -> Result<Option<Asset>> {
        let conn = get_conn(&self.pool)?;
        assets::get_asset(&conn, id)
    }

    fn access_snapshot(
        &self,
        user_id: UserId,
        asset_id: AssetId,
    ) -> Result<Option<AccessSnapshot>> {
        let conn = get_conn(&self.pool)?;
        Ok(orders::entitlement_row(&conn, user_id, asset_id)?.map(
            |(asset, has_paid_order)| AccessSnapshot {
                asset,
                has_paid_order,
            },
        ))
    }

    fn open_order(
        &self,
        user_id: UserId,
        asset: &Asset,
        gateway_order_id: &str,
        currency: &str,
    ) -> Result<Order> {
        let conn = get_conn(&self.pool)?;
        orders::create_pending_order(
            &conn,
            user_id,
            asset.id,
            gateway_order_id,
            asset.price,
            currency,
        )
    }

    fn record_payment(&self, record: &PaymentRecord<'_>) -> Result<PaymentOutcome> {
        let mut conn = get_conn(&self.pool)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::database(e.to_string()))?;

        let asset = assets::get_asset(&tx, record.asset_id)?
            .ok_or_else(|| Error::not_found("asset", record.asset_id))?;

        // A retried confirmation resolves to the row it already produced.
        if let Some(existing) = orders::get_order_by_payment_ref(&tx, record.payment_ref)? {
            if existing.user_id == record.user_id && existing.asset_id == record.asset_id {
                return Ok(PaymentOutcome::AlreadyRecorded(existing));
            }
            return Err(Error::Conflict(format!(
                "payment reference {} is already attached to another order",
                record.payment_ref
            )));
        }

        // Any local order carrying this gateway handle must be the caller's
        // own open checkout for this asset.
        let checkout = match record.gateway_order_id {
            Some(gid) => orders::get_order_by_gateway_order(&tx, gid)?,
            None => None,
        };

        let outcome = match checkout {
            Some(order) => {
                if order.user_id != record.user_id {
                    return Err(Error::Conflict(format!(
                        "checkout {} belongs to another account",
                        order.id
                    )));
                }
                if order.asset_id != asset.id {
                    return Err(Error::Validation(format!(
                        "checkout {} was opened for a different asset",
                        order.id
                    )));
                }
                let settled_now = order.status.is_open()
                    && orders::mark_paid(&tx, order.id, record.payment_ref)?;
                if !settled_now {
                    return Err(Error::Conflict(format!(
                        "order {} is {} and cannot be paid",
                        order.id, order.status
                    )));
                }
                let settled = orders::get_order(&tx, order.id)?
                    .ok_or_else(|| Error::Internal(format!("order {} vanished", order.id)))?;
                PaymentOutcome::Settled(settled)
            }
            None if record.checkout_required => {
                return Err(Error::Validation(format!(
                    "no open checkout for gateway order {}",
                    record.gateway_order_id.unwrap_or("(none)")
                )));
            }
            None => PaymentOutcome::Inserted(orders::insert_paid_order(
                &tx,
                record.user_id,
                asset.id,
                record.payment_ref,
                asset.price,
                record.currency,
            )?),
        };

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(outcome)
    }

    fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let conn = get_conn(&self.pool)?;
        orders::get_order(&conn, id)
    }

    fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let conn = get_conn(&self.pool)?;
        orders::list_orders_for_user(&conn, user_id)
    }

    fn abandon_order(&self, id: OrderId) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        orders::mark_failed(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, init_pool};
    use crate::queries::users;
    use assert_matches::assert_matches;
    use rp_core::{OrderStatus, Role};
    use std::sync::Arc;

    fn setup() -> (SqliteEntitlementStore, UserId, Asset) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let user = users::create_user(&conn, "buyer", Role::User).unwrap();
        let asset = assets::create_asset(&conn, "Film", "", 500, "film.mp4").unwrap();
        drop(conn);
        (SqliteEntitlementStore::new(pool), user.id, asset)
    }

    fn record<'a>(user_id: UserId, asset_id: AssetId, payment_ref: &'a str) -> PaymentRecord<'a> {
        PaymentRecord {
            user_id,
            asset_id,
            payment_ref,
            gateway_order_id: None,
            currency: "INR",
            checkout_required: false,
        }
    }

    #[test]
    fn snapshot_reflects_recorded_payment() {
        let (store, uid, asset) = setup();
        let before = store.access_snapshot(uid, asset.id).unwrap().unwrap();
        assert!(!before.has_paid_order);

        let outcome = store.record_payment(&record(uid, asset.id, "pay_abc")).unwrap();
        assert_matches!(outcome, PaymentOutcome::Inserted(ref o) if o.amount == 500);

        let after = store.access_snapshot(uid, asset.id).unwrap().unwrap();
        assert!(after.has_paid_order);
    }

    #[test]
    fn retried_payment_is_idempotent() {
        let (store, uid, asset) = setup();
        let first = store
            .record_payment(&record(uid, asset.id, "pay_retry"))
            .unwrap()
            .into_order();
        let second = store.record_payment(&record(uid, asset.id, "pay_retry")).unwrap();
        assert_matches!(second, PaymentOutcome::AlreadyRecorded(ref o) if o.id == first.id);
        assert_eq!(store.orders_for_user(uid).unwrap().len(), 1);
    }

    #[test]
    fn payment_ref_reuse_by_another_user_conflicts() {
        let (store, uid, asset) = setup();
        let other = {
            let conn = store.pool().get().unwrap();
            users::create_user(&conn, "thief", Role::User).unwrap().id
        };
        store.record_payment(&record(uid, asset.id, "pay_once")).unwrap();
        let err = store
            .record_payment(&record(other, asset.id, "pay_once"))
            .unwrap_err();
        assert_matches!(err, Error::Conflict(_));
        assert!(!store.access_snapshot(other, asset.id).unwrap().unwrap().has_paid_order);
    }

    #[test]
    fn settles_pending_checkout_with_frozen_amount() {
        let (store, uid, asset) = setup();
        let pending = store.open_order(uid, &asset, "order_x", "INR").unwrap();

        {
            let conn = store.pool().get().unwrap();
            assets::update_price(&conn, asset.id, 900).unwrap();
        }

        let mut rec = record(uid, asset.id, "pay_x");
        rec.gateway_order_id = Some("order_x");
        let outcome = store.record_payment(&rec).unwrap();
        assert_matches!(outcome, PaymentOutcome::Settled(ref o) if o.id == pending.id);
        assert_eq!(outcome.order().amount, 500);
        assert_eq!(outcome.order().status, OrderStatus::Paid);
    }

    #[test]
    fn direct_payment_uses_current_price() {
        let (store, uid, asset) = setup();
        {
            let conn = store.pool().get().unwrap();
            assets::update_price(&conn, asset.id, 900).unwrap();
        }
        let order = store
            .record_payment(&record(uid, asset.id, "pay_now"))
            .unwrap()
            .into_order();
        assert_eq!(order.amount, 900);
    }

    #[test]
    fn checkout_for_other_asset_rejected() {
        let (store, uid, asset) = setup();
        let other_asset = {
            let conn = store.pool().get().unwrap();
            assets::create_asset(&conn, "Other", "", 100, "other.mp4").unwrap()
        };
        store.open_order(uid, &other_asset, "order_other", "INR").unwrap();

        let mut rec = record(uid, asset.id, "pay_y");
        rec.gateway_order_id = Some("order_other");
        assert_matches!(store.record_payment(&rec), Err(Error::Validation(_)));
        assert!(!store.access_snapshot(uid, asset.id).unwrap().unwrap().has_paid_order);
    }

    #[test]
    fn abandoned_checkout_cannot_be_paid() {
        let (store, uid, asset) = setup();
        let pending = store.open_order(uid, &asset, "order_gone", "INR").unwrap();
        assert!(store.abandon_order(pending.id).unwrap());
        assert!(!store.abandon_order(pending.id).unwrap());

        let mut rec = record(uid, asset.id, "pay_late");
        rec.gateway_order_id = Some("order_gone");
        assert_matches!(store.record_payment(&rec), Err(Error::Conflict(_)));
    }

    #[test]
    fn foreign_checkout_cannot_be_settled() {
        let (store, uid, cheap) = setup();
        let (thief, pricey) = {
            let conn = store.pool().get().unwrap();
            (
                users::create_user(&conn, "thief", Role::User).unwrap().id,
                assets::create_asset(&conn, "Pricey", "", 9000, "pricey.mp4").unwrap(),
            )
        };
        store.open_order(uid, &cheap, "order_mine", "INR").unwrap();

        for asset_id in [pricey.id, cheap.id] {
            let mut rec = record(thief, asset_id, "pay_stolen");
            rec.gateway_order_id = Some("order_mine");
            assert_matches!(store.record_payment(&rec), Err(Error::Conflict(_)));
        }
        assert!(!store.access_snapshot(thief, pricey.id).unwrap().unwrap().has_paid_order);
        assert!(store.orders_for_user(thief).unwrap().is_empty());
    }

    #[test]
    fn checkout_required_refuses_direct_insert() {
        let (store, uid, asset) = setup();
        let mut rec = record(uid, asset.id, "pay_loose");
        rec.checkout_required = true;
        assert_matches!(store.record_payment(&rec), Err(Error::Validation(_)));

        rec.gateway_order_id = Some("order_unknown");
        assert_matches!(store.record_payment(&rec), Err(Error::Validation(_)));
        assert!(store.orders_for_user(uid).unwrap().is_empty());
    }

    #[test]
    fn unknown_asset_is_not_found() {
        let (store, uid, _) = setup();
        assert_matches!(
            store.record_payment(&record(uid, AssetId::new(), "pay_z")),
            Err(Error::NotFound { .. })
        );
        assert!(store.orders_for_user(uid).unwrap().is_empty());
    }

    #[test]
    fn concurrent_confirmations_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(dir.path().join("c.db").to_str().unwrap()).unwrap();
        let (uid, asset_id) = {
            let conn = pool.get().unwrap();
            let u = users::create_user(&conn, "racer", Role::User).unwrap();
            let a = assets::create_asset(&conn, "Race", "", 10, "race.mp4").unwrap();
            (u.id, a.id)
        };
        let store = Arc::new(SqliteEntitlementStore::new(pool));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.record_payment(&PaymentRecord {
                        user_id: uid,
                        asset_id,
                        payment_ref: "pay_same",
                        gateway_order_id: None,
                        currency: "INR",
                        checkout_required: false,
                    })
                })
            })
            .collect();

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        let inserted = outcomes
            .iter()
            .filter(|o| matches!(o, PaymentOutcome::Inserted(_)))
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.orders_for_user(uid).unwrap().len(), 1);
    }
}
