//! rp-db: database access and persistence layer.
//!
//! This crate provides SQLite-backed storage with connection pooling,
//! embedded migrations, typed models, query modules for users, tokens,
//! assets and orders, and the [`store::EntitlementStore`] capability that
//! the access evaluator and order controller are built on.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;
