//! Database query modules.

pub mod assets;
pub mod auth;
pub mod orders;
pub mod users;

/// Current time as an RFC 3339 UTC timestamp with second precision.
///
/// All timestamp columns use this fixed-width format so that lexical
/// comparison in SQL matches chronological order.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
