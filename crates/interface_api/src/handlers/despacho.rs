//! Despacho handlers: manual import, CMS search/count proxy, and local
//! state mutations with their best-effort follow-up push

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{CmsId, DespachoId};
use domain_sync::{
    ImportDecision, OutboundOutcome, PublicationState, VerificationState,
};

use crate::dto::{
    CountResponse, ImportRequest, ImportResponse, MutationResponse, MutationSyncStatus,
    SearchQuery, SearchResultItem, UpdatePublicationRequest, UpdateVerificationRequest,
};
use crate::error::ApiError;
use crate::handlers::webhook::to_import_response;
use crate::AppState;

/// Imports a despacho from the CMS by id (manual action)
pub async fn import_despacho(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let cms_id = CmsId::new(request.cms_id);

    let outcome = state
        .orchestrator
        .import_remote(cms_id)
        .await
        .map_err(|e| ApiError::from(e).for_object(cms_id))?;
    Ok(Json(to_import_response(outcome)))
}

/// Searches the CMS by text for the manual-import UI
///
/// Ordering is CMS-default and not guaranteed stable. Each hit is annotated
/// with whether it is already fully imported locally.
pub async fn search_despachos(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResultItem>>, ApiError> {
    query
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let per_page = query.per_page.unwrap_or(10).min(100);

    let docs = state.cms.search_by_text(&query.q, per_page).await?;
    let mut items = Vec::with_capacity(docs.len());
    for doc in &docs {
        let already_imported = match doc.id {
            Some(id) => matches!(
                state.orchestrator.correlator().resolve(id).await?,
                ImportDecision::AlreadyImported(_)
            ),
            None => false,
        };
        items.push(SearchResultItem::from_doc(doc, already_imported));
    }
    Ok(Json(items))
}

/// Total number of published despachos on the CMS side
pub async fn count_despachos(
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, ApiError> {
    let total = state.cms.count_published().await?;
    Ok(Json(CountResponse { total }))
}

/// Updates the verification state, then pushes best-effort
pub async fn update_verification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVerificationRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    mutate_and_push(state, id, Some(request.state), None).await
}

/// Updates the publication state, then pushes best-effort
pub async fn update_publication(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePublicationRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    mutate_and_push(state, id, None, Some(request.state)).await
}

/// Commits a local state mutation, then runs the outbound push
///
/// The mutation is visible to readers no matter what the push does: a
/// failed push degrades the despacho to pending-sync, it never rolls the
/// local change back, and this handler still answers 200.
async fn mutate_and_push(
    state: AppState,
    id: Uuid,
    verification: Option<VerificationState>,
    publication: Option<PublicationState>,
) -> Result<Json<MutationResponse>, ApiError> {
    let despacho_id = DespachoId::from(id);

    let despacho = state
        .store
        .update_states(despacho_id, verification, publication)
        .await
        .map_err(|e| ApiError::from(e).for_despacho(despacho_id))?;

    let sync = match state
        .orchestrator
        .sync_outbound(despacho_id, &CancellationToken::new())
        .await
    {
        Ok(OutboundOutcome::Completed { .. }) => MutationSyncStatus {
            success: true,
            enqueued: false,
            error: None,
        },
        Ok(OutboundOutcome::Enqueued { error, .. }) => MutationSyncStatus {
            success: false,
            enqueued: true,
            error: Some(error),
        },
        Ok(OutboundOutcome::Cancelled) => MutationSyncStatus {
            success: false,
            enqueued: false,
            error: Some("sync was cancelled".to_string()),
        },
        Err(e) => {
            tracing::error!(despacho_id = %despacho_id, error = %e, "follow-up push failed");
            MutationSyncStatus {
                success: false,
                enqueued: false,
                error: Some(e.to_string()),
            }
        }
    };

    // Re-read so the response reflects any correlation the push assigned
    let despacho = state
        .store
        .get_aggregate(despacho_id)
        .await
        .map(|aggregate| aggregate.despacho)
        .unwrap_or(despacho);

    Ok(Json(MutationResponse {
        despacho: despacho.into(),
        sync,
    }))
}
