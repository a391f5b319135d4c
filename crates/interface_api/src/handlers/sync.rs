//! Sync trigger handler

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tokio_util::sync::CancellationToken;

use core_kernel::DespachoId;
use domain_sync::OutboundOutcome;

use crate::dto::{SyncRequest, SyncResponse};
use crate::error::{ApiError, ErrorKind};
use crate::AppState;

/// Triggers an outbound sync for a despacho
///
/// Success answers 200 with the CMS object id; a transient failure answers
/// 202 with `enqueued: true` so the caller knows the re-driver owns it now.
/// Fatal taxonomy cases surface with their mapped status codes.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = DespachoId::from(request.despacho_id);

    match state
        .orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
    {
        Ok(OutboundOutcome::Completed { cms_id, .. }) => Ok((
            StatusCode::OK,
            Json(SyncResponse {
                success: true,
                despacho_id: request.despacho_id,
                object_id: Some(cms_id.value()),
                error: None,
                enqueued: None,
            }),
        )),
        Ok(OutboundOutcome::Enqueued { error, .. }) => Ok((
            StatusCode::ACCEPTED,
            Json(SyncResponse {
                success: false,
                despacho_id: request.despacho_id,
                object_id: None,
                error: Some(error),
                enqueued: Some(true),
            }),
        )),
        Ok(OutboundOutcome::Cancelled) => Err(ApiError::new(
            ErrorKind::Conflict,
            "sync was cancelled before completing",
        )
        .for_despacho(id)),
        Err(e) => Err(ApiError::from(e).for_despacho(id)),
    }
}
