//! HTTP API Layer
//!
//! REST surface of the synchronization core using Axum:
//!
//! - **Sync trigger**: explicit outbound sync for a despacho
//! - **Webhook ingress**: inbound CMS change notifications
//! - **Manual import**: fetch-and-import by CMS id, plus the search/count
//!   proxies backing the import UI
//! - **State mutations**: verification/publication changes with their
//!   best-effort follow-up push
//!
//! Handlers hold the Store and CMS ports as trait objects, so the router is
//! constructed identically over PostgreSQL/REST adapters in production and
//! in-memory doubles in tests.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_sync::{CmsPort, StorePort, SyncOrchestrator};

use crate::handlers::{despacho, health, sync, webhook};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorePort>,
    pub cms: Arc<dyn CmsPort>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn StorePort>,
        cms: Arc<dyn CmsPort>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        Self {
            store,
            cms,
            orchestrator,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Despacho routes
    let despacho_routes = Router::new()
        .route("/import", post(despacho::import_despacho))
        .route("/search", get(despacho::search_despachos))
        .route("/count", get(despacho::count_despachos))
        .route("/:id/verification", put(despacho::update_verification))
        .route("/:id/publication", put(despacho::update_publication));

    // Sync + ingress routes
    let api_routes = Router::new()
        .route("/sync", post(sync::trigger_sync))
        .route("/webhooks/cms", post(webhook::receive_cms_webhook))
        .nest("/despachos", despacho_routes);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
