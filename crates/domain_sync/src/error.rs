//! Error taxonomy for the synchronization core
//!
//! Adapters report [`PortError`]; the orchestrator folds them into this
//! taxonomy. Transient failures never appear here on the outbound path:
//! they become an `Enqueued` outcome instead of an error. Lost races on
//! the `cms_id` uniqueness constraint are redirected onto the completion
//! path internally and are not part of this taxonomy either.

use thiserror::Error;

use core_kernel::PortError;

/// Fatal synchronization errors surfaced to callers
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad input; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// The local aggregate does not exist; never retried
    #[error("Not found: {0}")]
    NotFound(String),

    /// CMS credentials missing or rejected; operator-visible, never retried
    #[error("Authentication configuration error: {0}")]
    AuthConfig(String),

    /// The CMS rejected the payload (schema validation); never retried
    #[error("CMS rejected the payload: {0}")]
    Rejected(String),

    /// A dependency is transiently unavailable on a read path
    ///
    /// Only surfaced where there is no queue to degrade to (manual
    /// imports, proxy reads); outbound pushes enqueue instead.
    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure in the Store or the sync core
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        SyncError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SyncError::Internal(message.into())
    }
}

impl From<PortError> for SyncError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { .. } => SyncError::NotFound(error.to_string()),
            PortError::Validation { .. } => SyncError::Validation(error.to_string()),
            PortError::Unauthorized { .. } => SyncError::AuthConfig(error.to_string()),
            PortError::Transformation { .. } => SyncError::Rejected(error.to_string()),
            e if e.is_transient() => SyncError::Unavailable(e.to_string()),
            _ => SyncError::Internal(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_mapping() {
        let e: SyncError = PortError::not_found("Despacho", "x").into();
        assert!(matches!(e, SyncError::NotFound(_)));

        let e: SyncError = PortError::unauthorized("missing CMS credentials").into();
        assert!(matches!(e, SyncError::AuthConfig(_)));

        let e: SyncError = PortError::Transformation {
            message: "title required".to_string(),
        }
        .into();
        assert!(matches!(e, SyncError::Rejected(_)));

        let e: SyncError = PortError::internal("boom").into();
        assert!(matches!(e, SyncError::Internal(_)));
    }
}
