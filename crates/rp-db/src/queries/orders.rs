//! Order operations.
//!
//! State transitions are guarded in SQL (`WHERE status = 'pending'`), so a
//! transition that lost a race reports `false` instead of overwriting a
//! terminal state.

use rusqlite::Connection;
use rp_core::{AssetId, Error, OrderId, OrderStatus, Result, UserId};

use crate::models::{Asset, Order};

const COLS: &str = "id, user_id, asset_id, gateway_order_id, payment_ref, status, amount, \
                    currency, created_at, paid_at";

fn map_insert_err(e: rusqlite::Error) -> Error {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        Error::Conflict(format!("Order reference already recorded: {msg}"))
    } else if msg.contains("FOREIGN KEY constraint failed") {
        Error::Validation("order references an unknown user or asset".into())
    } else {
        Error::database(msg)
    }
}

fn query_one(conn: &Connection, where_clause: &str, param: &str) -> Result<Option<Order>> {
    let q = format!("SELECT {COLS} FROM orders WHERE {where_clause}");
    let result = conn.query_row(&q, [param], Order::from_row);
    match result {
        Ok(o) => Ok(Some(o)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Record a checkout that has been handed to the payment gateway.
pub fn create_pending_order(
    conn: &Connection,
    user_id: UserId,
    asset_id: AssetId,
    gateway_order_id: &str,
    amount: i64,
    currency: &str,
) -> Result<Order> {
    let id = OrderId::new();
    let created_at = super::now_timestamp();

    conn.execute(
        "INSERT INTO orders (id, user_id, asset_id, gateway_order_id, status, amount, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7)",
        rusqlite::params![
            id.to_string(),
            user_id.to_string(),
            asset_id.to_string(),
            gateway_order_id,
            amount,
            currency,
            created_at
        ],
    )
    .map_err(map_insert_err)?;

    Ok(Order {
        id,
        user_id,
        asset_id,
        gateway_order_id: Some(gateway_order_id.to_string()),
        payment_ref: None,
        status: OrderStatus::Pending,
        amount,
        currency: currency.to_string(),
        created_at,
        paid_at: None,
    })
}

/// Insert an order directly in the Paid state.
pub fn insert_paid_order(
    conn: &Connection,
    user_id: UserId,
    asset_id: AssetId,
    payment_ref: &str,
    amount: i64,
    currency: &str,
) -> Result<Order> {
    let id = OrderId::new();
    let now = super::now_timestamp();

    conn.execute(
        "INSERT INTO orders (id, user_id, asset_id, payment_ref, status, amount, currency, created_at, paid_at)
         VALUES (?1, ?2, ?3, ?4, 'paid', ?5, ?6, ?7, ?7)",
        rusqlite::params![
            id.to_string(),
            user_id.to_string(),
            asset_id.to_string(),
            payment_ref,
            amount,
            currency,
            now
        ],
    )
    .map_err(map_insert_err)?;

    Ok(Order {
        id,
        user_id,
        asset_id,
        gateway_order_id: None,
        payment_ref: Some(payment_ref.to_string()),
        status: OrderStatus::Paid,
        amount,
        currency: currency.to_string(),
        created_at: now.clone(),
        paid_at: Some(now),
    })
}

/// Move a Pending order to Paid. Returns false if it was not Pending.
pub fn mark_paid(conn: &Connection, id: OrderId, payment_ref: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE orders SET status = 'paid', payment_ref = ?1, paid_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            rusqlite::params![payment_ref, super::now_timestamp(), id.to_string()],
        )
        .map_err(map_insert_err)?;
    Ok(n > 0)
}

/// Move a Pending order to Failed. Returns false if it was not Pending.
pub fn mark_failed(conn: &Connection, id: OrderId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE orders SET status = 'failed' WHERE id = ?1 AND status = 'pending'",
            [id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Get an order by primary key.
pub fn get_order(conn: &Connection, id: OrderId) -> Result<Option<Order>> {
    query_one(conn, "id = ?1", &id.to_string())
}

/// Find the order carrying a given payment reference.
pub fn get_order_by_payment_ref(conn: &Connection, payment_ref: &str) -> Result<Option<Order>> {
    query_one(conn, "payment_ref = ?1", payment_ref)
}

/// Find the order created for a given gateway order handle.
pub fn get_order_by_gateway_order(
    conn: &Connection,
    gateway_order_id: &str,
) -> Result<Option<Order>> {
    query_one(conn, "gateway_order_id = ?1", gateway_order_id)
}

/// Read an asset and the caller's paid-order flag in a single statement.
///
/// Returns `None` when the asset does not exist. Because both facts come
/// from one SELECT they reflect the same snapshot of the database.
pub fn entitlement_row(
    conn: &Connection,
    user_id: UserId,
    asset_id: AssetId,
) -> Result<Option<(Asset, bool)>> {
    let result = conn.query_row(
        "SELECT a.id, a.title, a.description, a.price, a.storage_key, a.created_at,
                EXISTS(SELECT 1 FROM orders o
                       WHERE o.user_id = ?1 AND o.asset_id = a.id AND o.status = 'paid')
         FROM assets a WHERE a.id = ?2",
        [user_id.to_string(), asset_id.to_string()],
        |row| Ok((Asset::from_row(row)?, row.get::<_, bool>(6)?)),
    );
    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List a user's orders, newest first.
pub fn list_orders_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<Order>> {
    let q = format!("SELECT {COLS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([user_id.to_string()], Order::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
