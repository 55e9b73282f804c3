//! Commerce-domain types: roles, caller identity, and order states.
//!
//! All enums serialize in lowercase and implement `Display` / `FromStr`
//! so they round-trip through TEXT columns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::UserId;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An authenticated caller, resolved once per request by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether this identity bypasses purchase checks.
    ///
    /// This is the only place the administrative override is derived; every
    /// access decision goes through it.
    pub fn has_override(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this identity may act on a resource owned by `owner`.
    pub fn may_view_owned_by(&self, owner: UserId) -> bool {
        self.user_id == owner || self.has_override()
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a purchase order.
///
/// `Pending -> Paid` happens at most once and `Paid` is terminal.
/// `Pending -> Failed` records an abandoned checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    /// Whether the order can still move to another state.
    pub fn is_open(self) -> bool {
        self == Self::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Convert a whole-unit catalog price into the currency's minor unit
/// (e.g. rupees to paise). Returns `None` on overflow.
pub fn to_minor_units(price: i64) -> Option<i64> {
    price.checked_mul(100)
}
