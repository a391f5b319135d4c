//! Core Kernel - Foundational types and utilities for the directory platform
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Strongly-typed identifiers for the three representations of a despacho
//! - Common error types
//! - Ports-and-adapters infrastructure shared by Store and CMS adapters

pub mod error;
pub mod identifiers;
pub mod ports;

pub use error::CoreError;
pub use identifiers::{CmsId, DespachoId, SearchIndexId, SedeId, SyncEntryId};
pub use ports::{
    AdapterHealth, DomainPort, ExternalAuthConfig, HealthCheckResult, HealthCheckable, PortError,
};
