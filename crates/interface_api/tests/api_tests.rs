//! HTTP-layer behaviour, exercised with axum-test against the in-memory
//! port doubles

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};

use domain_sync::{SyncConfig, SyncOrchestrator};
use interface_api::{create_router, AppState};
use test_utils::{CmsDocBuilder, DespachoBuilder, InMemoryStore, ScriptedCms, SedeBuilder};

fn test_app() -> (Arc<InMemoryStore>, Arc<ScriptedCms>, TestServer) {
    let store = Arc::new(InMemoryStore::new());
    let cms = Arc::new(ScriptedCms::new());
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        cms.clone(),
        SyncConfig::default(),
    ));
    let app = create_router(AppState::new(store.clone(), cms.clone(), orchestrator));
    let server = TestServer::new(app).expect("router should build");
    (store, cms, server)
}

fn seed_despacho(store: &InMemoryStore) -> uuid::Uuid {
    let despacho = DespachoBuilder::new().build();
    let id = despacho.id;
    store.seed_sede(SedeBuilder::for_despacho(id).build());
    store.seed_despacho(despacho);
    *id.as_uuid()
}

#[tokio::test]
async fn test_health_endpoints() {
    let (_store, _cms, server) = test_app();

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "ok");

    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn test_sync_trigger_success() {
    let (store, _cms, server) = test_app();
    let id = seed_despacho(&store);

    let response = server
        .post("/api/v1/sync")
        .json(&json!({ "despachoId": id }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["despachoId"], id.to_string());
    assert!(body["objectId"].is_i64());
}

#[tokio::test]
async fn test_sync_trigger_transient_failure_enqueues() {
    let (store, cms, server) = test_app();
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);

    let response = server
        .post("/api/v1/sync")
        .json(&json!({ "despachoId": id }))
        .await;

    assert_eq!(response.status_code(), 202);
    let body = response.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(body["enqueued"], true);
    assert!(body["error"].is_string());
    assert_eq!(store.queue_entries().len(), 1);
}

#[tokio::test]
async fn test_sync_trigger_unknown_despacho() {
    let (_store, _cms, server) = test_app();
    let id = uuid::Uuid::new_v4();

    let response = server
        .post("/api/v1/sync")
        .json(&json!({ "despachoId": id }))
        .await;

    assert_eq!(response.status_code(), 404);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["despachoId"], id.to_string());
}

#[tokio::test]
async fn test_sync_trigger_rejects_malformed_body() {
    let (_store, _cms, server) = test_app();

    let response = server.post("/api/v1/sync").json(&json!({})).await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_webhook_requires_external_id() {
    let (store, _cms, server) = test_app();

    let response = server
        .post("/api/v1/webhooks/cms")
        .json(&json!({ "title": "Bufete Sin Id" }))
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["error"], "bad_request");
    assert_eq!(store.despacho_count(), 0);
}

#[tokio::test]
async fn test_webhook_import_complete_then_noop() {
    let (store, _cms, server) = test_app();

    // First contact: no locality data
    let response = server
        .post("/api/v1/webhooks/cms")
        .json(&json!({ "id": 2002, "title": "Bufete Webhook", "status": "publish" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["result"], "imported");
    assert_eq!(body["objectId"], 2002);
    let despacho_id = body["despachoId"].as_str().unwrap().to_string();

    // Second contact brings the locality and completes the record
    let response = server
        .post("/api/v1/webhooks/cms")
        .json(&json!({
            "id": 2002,
            "title": "Bufete Webhook",
            "status": "publish",
            "sedes": [{ "ciudad": "Bilbao", "es_principal": true }]
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["result"], "completed");
    assert_eq!(body["despachoId"], despacho_id);

    // Third contact is a strict no-op
    let response = server
        .post("/api/v1/webhooks/cms")
        .json(&json!({ "id": 2002, "title": "Otro Nombre", "status": "publish" }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["result"], "alreadyImported");

    assert_eq!(store.despacho_count(), 1);
}

#[tokio::test]
async fn test_manual_import_by_cms_id() {
    let (store, cms, server) = test_app();
    cms.insert_doc(CmsDocBuilder::new().with_id(501).build());

    let response = server
        .post("/api/v1/despachos/import")
        .json(&json!({ "cmsId": 501 }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["result"], "imported");
    assert_eq!(body["objectId"], 501);
    assert_eq!(store.despacho_count(), 1);
}

#[tokio::test]
async fn test_manual_import_unknown_id_echoes_object() {
    let (_store, _cms, server) = test_app();

    let response = server
        .post("/api/v1/despachos/import")
        .json(&json!({ "cmsId": 888 }))
        .await;

    assert_eq!(response.status_code(), 404);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["objectId"], 888);
}

#[tokio::test]
async fn test_manual_import_validates_id() {
    let (_store, _cms, server) = test_app();

    let response = server
        .post("/api/v1/despachos/import")
        .json(&json!({ "cmsId": 0 }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_search_decodes_and_flags_imported() {
    let (_store, cms, server) = test_app();
    cms.insert_doc(
        CmsDocBuilder::new()
            .with_id(601)
            .with_title("Bufete Garc&iacute;a")
            .build(),
    );
    cms.insert_doc(
        CmsDocBuilder::new()
            .with_id(602)
            .with_title("Bufete Soto")
            .build(),
    );

    // Import one of the two hits first
    server
        .post("/api/v1/despachos/import")
        .json(&json!({ "cmsId": 601 }))
        .await
        .assert_status_ok();

    let response = server.get("/api/v1/despachos/search?q=Bufete&perPage=10").await;
    assert_eq!(response.status_code(), 200);
    let items = response.json::<Vec<Value>>();
    assert_eq!(items.len(), 2);

    let garcia = items.iter().find(|i| i["id"] == 601).unwrap();
    assert_eq!(garcia["title"], "Bufete García");
    assert_eq!(garcia["alreadyImported"], true);

    let soto = items.iter().find(|i| i["id"] == 602).unwrap();
    assert_eq!(soto["alreadyImported"], false);
}

#[tokio::test]
async fn test_search_requires_query() {
    let (_store, _cms, server) = test_app();
    let response = server.get("/api/v1/despachos/search").await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_count_proxies_header_total() {
    let (_store, cms, server) = test_app();
    cms.set_total(37);

    let response = server.get("/api/v1/despachos/count").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["total"], 37);
}

#[tokio::test]
async fn test_mutation_commits_even_when_push_fails() {
    let (store, cms, server) = test_app();
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);

    let response = server
        .put(&format!("/api/v1/despachos/{}/verification", id))
        .json(&json!({ "state": "verified" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["despacho"]["verification"], "verified");
    assert_eq!(body["despacho"]["lastSyncSucceeded"], false);
    assert_eq!(body["sync"]["success"], false);
    assert_eq!(body["sync"]["enqueued"], true);

    // The local change is visible to readers despite the failed push
    let stored = store.get_despacho(id.into()).unwrap();
    assert_eq!(
        stored.verification,
        domain_sync::VerificationState::Verified
    );
    assert_eq!(store.queue_entries().len(), 1);
}

#[tokio::test]
async fn test_mutation_with_healthy_cms_syncs_and_correlates() {
    let (store, _cms, server) = test_app();
    let id = seed_despacho(&store);

    let response = server
        .put(&format!("/api/v1/despachos/{}/publication", id))
        .json(&json!({ "state": "published" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body = response.json::<Value>();
    assert_eq!(body["sync"]["success"], true);
    assert_eq!(body["despacho"]["publication"], "published");
    assert!(body["despacho"]["cmsId"].is_i64());
    assert_eq!(body["despacho"]["lastSyncSucceeded"], true);

    assert!(store.get_despacho(id.into()).unwrap().cms_id.is_some());
}
