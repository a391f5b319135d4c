//! API error handling
//!
//! Every case of the sync taxonomy maps to a stable status/error code, and
//! the response echoes `despachoId`/`objectId` whenever they are known so a
//! caller can resume or poll.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use core_kernel::{CmsId, DespachoId, PortError};
use domain_sync::SyncError;

/// Stable error categories exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    CmsRejected,
    AuthConfig,
    Unavailable,
    Internal,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::CmsRejected => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::AuthConfig => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::CmsRejected => "cms_rejected",
            ErrorKind::AuthConfig => "auth_config_error",
            ErrorKind::Unavailable => "service_unavailable",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// API error carrying optional resume context
#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub despacho_id: Option<Uuid>,
    pub object_id: Option<i64>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            despacho_id: None,
            object_id: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attaches the despacho id for the caller to resume with
    pub fn for_despacho(mut self, id: DespachoId) -> Self {
        self.despacho_id = Some(*id.as_uuid());
        self
    }

    /// Attaches the CMS object id for the caller to resume with
    pub fn for_object(mut self, id: CmsId) -> Self {
        self.object_id = Some(id.value());
        self
    }
}

/// Error response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub despacho_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.kind.code().to_string(),
            message: self.message,
            despacho_id: self.despacho_id,
            object_id: self.object_id,
        };
        (self.kind.status(), Json(body)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        let kind = match &error {
            SyncError::Validation(_) => ErrorKind::BadRequest,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::AuthConfig(_) => ErrorKind::AuthConfig,
            SyncError::Rejected(_) => ErrorKind::CmsRejected,
            SyncError::Unavailable(_) => ErrorKind::Unavailable,
            SyncError::Internal(_) => ErrorKind::Internal,
        };
        ApiError::new(kind, error.to_string())
    }
}

impl From<PortError> for ApiError {
    fn from(error: PortError) -> Self {
        let kind = match &error {
            PortError::NotFound { .. } => ErrorKind::NotFound,
            PortError::Validation { .. } => ErrorKind::BadRequest,
            PortError::Conflict { .. } => ErrorKind::Conflict,
            PortError::Unauthorized { .. } => ErrorKind::AuthConfig,
            e if e.is_transient() => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        };
        ApiError::new(kind, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_mapping() {
        let api: ApiError = SyncError::validation("missing id").into();
        assert_eq!(api.kind, ErrorKind::BadRequest);

        let api: ApiError = SyncError::not_found("no such despacho").into();
        assert_eq!(api.kind, ErrorKind::NotFound);

        let api: ApiError = SyncError::Rejected("bad title".to_string()).into();
        assert_eq!(api.kind, ErrorKind::CmsRejected);

        let api: ApiError = SyncError::Unavailable("cms down".to_string()).into();
        assert_eq!(api.kind, ErrorKind::Unavailable);
    }

    #[test]
    fn test_port_error_mapping() {
        let api: ApiError = PortError::conflict("duplicate cms id").into();
        assert_eq!(api.kind, ErrorKind::Conflict);

        let api: ApiError = PortError::connection("refused").into();
        assert_eq!(api.kind, ErrorKind::Unavailable);
    }

    #[test]
    fn test_context_attachment() {
        let id = DespachoId::new();
        let api = ApiError::not_found("gone").for_despacho(id).for_object(CmsId::new(7));
        assert_eq!(api.despacho_id, Some(*id.as_uuid()));
        assert_eq!(api.object_id, Some(7));
    }
}
