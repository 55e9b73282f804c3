//! Route handlers for the HTTP API.

pub mod access;
pub mod health;
pub mod orders;
pub mod stream;

use rp_core::Error;

/// Parse a path segment into a typed ID, mapping failures to a 400.
pub(crate) fn parse_path_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, Error> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("Invalid {what}: {raw}")))
}
