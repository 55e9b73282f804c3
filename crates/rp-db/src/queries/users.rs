//! User operations.

use rusqlite::Connection;
use rp_core::{Error, Result, Role, UserId};

use crate::models::User;

const COLS: &str = "id, username, role, created_at";

/// Create a new user and return it.
pub fn create_user(conn: &Connection, username: &str, role: Role) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::Validation("username must not be empty".into()));
    }

    let id = UserId::new();
    let created_at = super::now_timestamp();

    conn.execute(
        "INSERT INTO users (id, username, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), username, role.to_string(), created_at],
    )
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            Error::Conflict(format!("Username '{username}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(User {
        id,
        username: username.to_string(),
        role,
        created_at,
    })
}

/// Get a user by primary key.
pub fn get_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM users WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], User::from_row);
    match result {
        Ok(u) => Ok(Some(u)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a user by username.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM users WHERE username = ?1");
    let result = conn.query_row(&q, [username], User::from_row);
    match result {
        Ok(u) => Ok(Some(u)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}
