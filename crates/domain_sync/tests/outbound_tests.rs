//! Outbound sync behaviour
//!
//! Runs the orchestrator against the in-memory Store and a scripted CMS.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use core_kernel::{CmsId, DespachoId, PortError};
use domain_sync::{
    OutboundOutcome, QueueStatus, SyncConfig, SyncError, SyncEvent, SyncOrchestrator,
};
use test_utils::{DespachoBuilder, InMemoryStore, ScriptedCms, SedeBuilder};

fn engine() -> (Arc<InMemoryStore>, Arc<ScriptedCms>, SyncOrchestrator) {
    let store = Arc::new(InMemoryStore::new());
    let cms = Arc::new(ScriptedCms::new());
    let orchestrator = SyncOrchestrator::new(store.clone(), cms.clone(), SyncConfig::default());
    (store, cms, orchestrator)
}

fn seed_despacho(store: &InMemoryStore) -> DespachoId {
    let despacho = DespachoBuilder::new().with_name("Bufete Arranz").build();
    let id = despacho.id;
    store.seed_sede(SedeBuilder::for_despacho(id).build());
    store.seed_despacho(despacho);
    id
}

/// Scenario A: first push of an uncorrelated despacho assigns the CMS id
#[tokio::test]
async fn test_first_push_assigns_cms_id() {
    let (store, _cms, orchestrator) = engine();
    let id = seed_despacho(&store);

    let outcome = orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let OutboundOutcome::Completed { cms_id, created } = outcome else {
        panic!("expected completed outcome, got {:?}", outcome);
    };
    assert!(created);

    let despacho = store.get_despacho(id).unwrap();
    assert_eq!(despacho.cms_id, Some(cms_id));
    assert_eq!(
        despacho.search_index_id.unwrap().as_str(),
        format!("despacho_{}", cms_id)
    );
    assert!(despacho.last_sync_succeeded);
    assert!(despacho.last_sync_at.is_some());
}

/// Re-running with no local change produces no new CMS post and keeps the id
#[tokio::test]
async fn test_outbound_sync_is_idempotent() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    let cancel = CancellationToken::new();

    let first = orchestrator.sync_outbound(id, &cancel).await.unwrap();
    let OutboundOutcome::Completed { cms_id, .. } = first else {
        panic!("first sync should complete");
    };

    let second = orchestrator.sync_outbound(id, &cancel).await.unwrap();
    let OutboundOutcome::Completed {
        cms_id: second_id,
        created,
    } = second
    else {
        panic!("second sync should complete");
    };
    assert_eq!(second_id, cms_id);
    assert!(!created);

    let pushes = cms.pushes();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1].id, Some(cms_id));
    assert_eq!(store.get_despacho(id).unwrap().cms_id, Some(cms_id));
}

/// Scenario B: a 503-class failure enqueues a single fallido entry
#[tokio::test]
async fn test_transient_failure_enqueues() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);

    let before = chrono::Utc::now();
    let outcome = orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let OutboundOutcome::Enqueued { entry, error } = outcome else {
        panic!("expected enqueued outcome, got {:?}", outcome);
    };
    assert!(error.contains("unavailable"));
    assert_eq!(entry.status, QueueStatus::Failed);
    assert_eq!(entry.attempts, 1);
    assert!(entry.next_attempt_at > before);

    let despacho = store.get_despacho(id).unwrap();
    assert!(!despacho.last_sync_succeeded);
    assert!(despacho.cms_id.is_none());
}

/// Repeated failures refresh the one live entry instead of duplicating it
#[tokio::test]
async fn test_repeated_failures_keep_single_entry() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    cms.script_transient_failures(3);
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        let outcome = orchestrator.sync_outbound(id, &cancel).await.unwrap();
        assert!(matches!(outcome, OutboundOutcome::Enqueued { .. }));
    }

    let entries = store.queue_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempts, 3);
    assert!(entries[0].status.is_live());
}

/// A success after failures resolves the pending entry
#[tokio::test]
async fn test_success_resolves_pending_entry() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);
    let cancel = CancellationToken::new();

    orchestrator.sync_outbound(id, &cancel).await.unwrap();
    let outcome = orchestrator.sync_outbound(id, &cancel).await.unwrap();
    assert!(matches!(outcome, OutboundOutcome::Completed { .. }));

    let entries = store.queue_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, QueueStatus::Resolved);
}

/// A missing aggregate is fatal: no retry, no queue entry
#[tokio::test]
async fn test_missing_despacho_is_fatal() {
    let (store, _cms, orchestrator) = engine();

    let result = orchestrator
        .sync_outbound(DespachoId::new(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::NotFound(_))));
    assert!(store.queue_entries().is_empty());
}

/// A schema rejection from the CMS is fatal and never enqueued
#[tokio::test]
async fn test_cms_rejection_is_fatal() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    cms.script_push(Err(PortError::validation("title is required")));

    let result = orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::Rejected(_))));
    assert!(store.queue_entries().is_empty());
    // A fatal failure does not flip the sync flag
    let despacho = store.get_despacho(id).unwrap();
    assert!(despacho.last_sync_at.is_none());
}

/// Missing or rejected credentials fail fast, never enqueue
#[tokio::test]
async fn test_auth_failure_is_fatal() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    cms.script_push(Err(PortError::unauthorized("basic auth rejected")));

    let result = orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::AuthConfig(_))));
    assert!(store.queue_entries().is_empty());
}

/// A cancelled in-flight push leaves no trace
#[tokio::test]
async fn test_cancellation_aborts_push() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    cms.set_push_delay(Duration::from_secs(60));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = orchestrator.sync_outbound(id, &cancel).await.unwrap();

    assert!(matches!(outcome, OutboundOutcome::Cancelled));
    assert!(store.queue_entries().is_empty());
    assert!(store.get_despacho(id).unwrap().cms_id.is_none());
}

/// A push exceeding the bound is classified transient and enqueued
#[tokio::test(start_paused = true)]
async fn test_push_timeout_is_transient() {
    let store = Arc::new(InMemoryStore::new());
    let cms = Arc::new(ScriptedCms::new());
    let config = SyncConfig {
        push_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let orchestrator = SyncOrchestrator::new(store.clone(), cms.clone(), config);
    let id = seed_despacho(&store);
    cms.set_push_delay(Duration::from_secs(30));

    let outcome = orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let OutboundOutcome::Enqueued { error, .. } = outcome else {
        panic!("expected enqueued outcome, got {:?}", outcome);
    };
    assert!(error.contains("Timeout"));
}

/// Push outcomes are observable through the event channel
#[tokio::test]
async fn test_events_are_emitted() {
    let (store, cms, orchestrator) = engine();
    let id = seed_despacho(&store);
    let mut events = orchestrator.subscribe();

    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();
    let event = events.try_recv().unwrap();
    assert!(matches!(event, SyncEvent::PushSucceeded { despacho_id, .. } if despacho_id == id));

    cms.script_transient_failures(1);
    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();
    let event = events.try_recv().unwrap();
    assert!(matches!(event, SyncEvent::PushFailed { attempts: 1, .. }));
}

/// A despacho without an id in the CMS updates in place once correlated
#[tokio::test]
async fn test_correlated_despacho_updates_in_place() {
    let (store, cms, orchestrator) = engine();
    let despacho = DespachoBuilder::new().with_cms_id(4242).build();
    let id = despacho.id;
    store.seed_sede(SedeBuilder::for_despacho(id).build());
    store.seed_despacho(despacho);

    let outcome = orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let OutboundOutcome::Completed { cms_id, created } = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(cms_id, CmsId::new(4242));
    assert!(!created);
    assert_eq!(cms.pushes()[0].id, Some(CmsId::new(4242)));
}
