//! rp-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other rp-* crates,
//! providing type-safe identifiers, a unified error type, the commerce
//! domain enums (roles, order states), and application configuration.

pub mod commerce;
pub mod config;
pub mod error;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use commerce::*;
pub use error::{Error, Result};
pub use ids::*;
