//! Catalog asset operations.
//!
//! Assets are written only by operator tooling (the upload path); the
//! streaming and order paths read them.

use rusqlite::Connection;
use rp_core::{AssetId, Error, Result};

use crate::models::Asset;

pub(crate) const COLS: &str = "id, title, description, price, storage_key, created_at";

/// Insert a new asset.
pub fn create_asset(
    conn: &Connection,
    title: &str,
    description: &str,
    price: i64,
    storage_key: &str,
) -> Result<Asset> {
    if price < 0 {
        return Err(Error::Validation(format!("price must be >= 0, got {price}")));
    }
    if storage_key.trim().is_empty() {
        return Err(Error::Validation("storage_key must not be empty".into()));
    }

    let id = AssetId::new();
    let title = if title.trim().is_empty() { "Untitled" } else { title };
    let created_at = super::now_timestamp();

    conn.execute(
        "INSERT INTO assets (id, title, description, price, storage_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id.to_string(), title, description, price, storage_key, created_at],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Asset {
        id,
        title: title.to_string(),
        description: description.to_string(),
        price,
        storage_key: storage_key.to_string(),
        created_at,
    })
}

/// Get an asset by primary key.
pub fn get_asset(conn: &Connection, id: AssetId) -> Result<Option<Asset>> {
    let q = format!("SELECT {COLS} FROM assets WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Asset::from_row);
    match result {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Change an asset's price. Existing orders keep the amount they were
/// created with. Returns true if the asset existed.
pub fn update_price(conn: &Connection, id: AssetId, price: i64) -> Result<bool> {
    if price < 0 {
        return Err(Error::Validation(format!("price must be >= 0, got {price}")));
    }
    let n = conn
        .execute(
            "UPDATE assets SET price = ?1 WHERE id = ?2",
            rusqlite::params![price, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
