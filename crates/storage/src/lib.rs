//! `col-storage` — persistence boundary.
//!
//! One gateway trait, one method per domain query. Two implementations: an
//! in-memory table set for tests and dev mode, and a Postgres-backed gateway
//! for production.

pub mod gateway;
pub mod memory;
pub mod postgres;

pub use gateway::{StorageError, StorageGateway, StorageResult};
pub use memory::InMemoryGateway;
pub use postgres::PostgresGateway;
