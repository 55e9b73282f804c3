//! Unified error type for reelpass.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`]
//! and a stable machine-readable code via [`Error::code`].

use std::fmt;

/// Unified error type covering all failure modes in reelpass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "asset", "order").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but not entitled to the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists, or a state transition is not
    /// allowed from the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A payment confirmation arrived without a payment reference.
    #[error("Missing payment reference")]
    MissingReference,

    /// The asset's price cannot be charged under the current catalog policy.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The payment signature did not verify against the gateway secret.
    #[error("Invalid payment signature")]
    InvalidSignature,

    /// The requested byte range cannot be served for a blob of `total` bytes.
    #[error("Range not satisfiable (total length {total})")]
    RangeNotSatisfiable {
        /// Total length of the blob, reported back so the client can retry.
        total: u64,
    },

    /// The request uses a feature this server deliberately does not serve.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// An asset record exists but its stored bytes do not.
    #[error("Storage integrity error: {0}")]
    StorageIntegrity(String),

    /// The payment gateway rejected or failed a request.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    ///
    /// A missing blob surfaces as 404 on the wire; it is still a distinct
    /// variant so it gets logged as an integrity fault rather than treated
    /// as a denial.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::MissingReference => 400,
            Error::InvalidAmount(_) => 400,
            Error::InvalidSignature => 401,
            Error::RangeNotSatisfiable { .. } => 416,
            Error::NotImplemented(_) => 501,
            Error::StorageIntegrity(_) => 404,
            Error::Gateway(_) => 502,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Validation(_) => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::MissingReference => "missing_reference",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InvalidSignature => "invalid_signature",
            Error::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            Error::NotImplemented(_) => "not_implemented",
            Error::StorageIntegrity(_) => "storage_integrity_error",
            Error::Gateway(_) => "gateway_error",
            Error::Database { .. } => "database_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether this error indicates a fault on our side that operators
    /// should see in the logs.
    pub fn is_operational_fault(&self) -> bool {
        matches!(self, Error::StorageIntegrity(_)) || self.http_status() >= 500
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
