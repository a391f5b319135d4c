//! Port implementations backed by PostgreSQL

pub mod store;

pub use store::PostgresStoreAdapter;
