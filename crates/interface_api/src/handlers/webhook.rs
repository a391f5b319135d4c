//! Inbound webhook ingress
//!
//! Validates and normalizes CMS-origin payloads before handing them to the
//! orchestrator. The only hard requirement on the body is the external
//! numeric id; everything else is optional and defaulted.

use axum::{extract::State, Json};

use domain_sync::ImportOutcome;

use crate::dto::{ImportResponse, WebhookPayload};
use crate::error::ApiError;
use crate::AppState;

/// Receives a despacho change notification from the CMS
pub async fn receive_cms_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<ImportResponse>, ApiError> {
    let doc = payload.into_doc();
    let object_id = doc.id;

    let outcome = state.orchestrator.import_inbound(&doc).await.map_err(|e| {
        let api = ApiError::from(e);
        match object_id {
            Some(id) => api.for_object(id),
            None => api,
        }
    })?;

    Ok(Json(to_import_response(outcome)))
}

/// Maps an import outcome onto the wire shape shared by webhook and manual
/// import responses
pub fn to_import_response(outcome: ImportOutcome) -> ImportResponse {
    match outcome {
        ImportOutcome::Imported {
            despacho_id,
            correlation,
            ..
        } => ImportResponse {
            result: "imported".to_string(),
            despacho_id: *despacho_id.as_uuid(),
            object_id: correlation.cms_id.value(),
        },
        ImportOutcome::Completed {
            despacho_id,
            correlation,
            ..
        } => ImportResponse {
            result: "completed".to_string(),
            despacho_id: *despacho_id.as_uuid(),
            object_id: correlation.cms_id.value(),
        },
        ImportOutcome::AlreadyImported(correlation) => ImportResponse {
            result: "alreadyImported".to_string(),
            despacho_id: *correlation.despacho_id.as_uuid(),
            object_id: correlation.cms_id.value(),
        },
    }
}
