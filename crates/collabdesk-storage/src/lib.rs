//! Collabdesk Storage - PostgreSQL persistence
//!
//! This crate owns the database pool, the schema migrations, the row
//! models and the repositories used by the API and the dispatch engine.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
