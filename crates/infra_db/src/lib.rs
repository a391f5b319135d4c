//! PostgreSQL infrastructure for the canonical Store
//!
//! Provides the connection pool, embedded migrations, row-level
//! repositories, and [`PostgresStoreAdapter`], the production
//! implementation of the Store port consumed by the sync core.

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresStoreAdapter;
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, MIGRATOR};
