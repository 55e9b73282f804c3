//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`. Column order must match the `COLS` constant of the
//! corresponding query module.

use std::str::FromStr;

use rp_core::{AssetId, Identity, OrderId, OrderStatus, Role, SessionId, UserId};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
pub(crate) fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

/// Parse a lowercase enum (role, status) from a text column.
fn parse_enum<T: FromStr<Err = String>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    s.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: String,
}

impl User {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            username: row.get(1)?,
            role: parse_enum(row, 2)?,
            created_at: row.get(3)?,
        })
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.role)
    }
}

// ---------------------------------------------------------------------------
// AuthToken
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuthToken {
    pub id: SessionId,
    pub user_id: UserId,
    pub token: String,
    pub expires_at: String,
}

impl AuthToken {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            user_id: parse_id(row, 1)?,
            token: row.get(2)?,
            expires_at: row.get(3)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A purchasable media item. Read-only to the streaming and order paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: AssetId,
    pub title: String,
    pub description: String,
    /// Price in whole currency units.
    pub price: i64,
    /// Blob-store key of the media bytes.
    pub storage_key: String,
    pub created_at: String,
}

impl Asset {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            price: row.get(3)?,
            storage_key: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A purchase attempt and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub gateway_order_id: Option<String>,
    pub payment_ref: Option<String>,
    pub status: OrderStatus,
    /// Amount frozen when the order was created, in whole currency units.
    pub amount: i64,
    pub currency: String,
    pub created_at: String,
    pub paid_at: Option<String>,
}

impl Order {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            user_id: parse_id(row, 1)?,
            asset_id: parse_id(row, 2)?,
            gateway_order_id: row.get(3)?,
            payment_ref: row.get(4)?,
            status: parse_enum(row, 5)?,
            amount: row.get(6)?,
            currency: row.get(7)?,
            created_at: row.get(8)?,
            paid_at: row.get(9)?,
        })
    }
}
