//! Shared test utilities for the directory platform
//!
//! Builders construct domain values with sensible defaults; doubles provide
//! in-memory implementations of the Store and CMS ports so the sync core
//! and the HTTP layer are testable without PostgreSQL or network access.

pub mod builders;
pub mod doubles;

pub use builders::{aggregate_with_sede, CmsDocBuilder, DespachoBuilder, SedeBuilder};
pub use doubles::{InMemoryStore, ScriptedCms};
