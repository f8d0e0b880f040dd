//! Storage layer
//!
//! Persists the library in a single SQLite database so that novels, their
//! content, and source registrations can be written in one transaction.

pub mod database;
pub mod error;
pub mod schema;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
