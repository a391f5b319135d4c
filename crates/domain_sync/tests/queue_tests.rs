//! Retry queue re-drive behaviour

use std::sync::Arc;

use chrono::{Duration, Utc};

use domain_sync::{
    OutboundOutcome, QueueStatus, ReDriver, SyncConfig, SyncEvent, SyncOrchestrator,
};
use test_utils::{DespachoBuilder, InMemoryStore, ScriptedCms, SedeBuilder};
use tokio_util::sync::CancellationToken;

fn engine_with(
    config: SyncConfig,
) -> (
    Arc<InMemoryStore>,
    Arc<ScriptedCms>,
    Arc<SyncOrchestrator>,
    ReDriver,
) {
    let store = Arc::new(InMemoryStore::new());
    let cms = Arc::new(ScriptedCms::new());
    let orchestrator = Arc::new(SyncOrchestrator::new(store.clone(), cms.clone(), config));
    let redriver = ReDriver::new(store.clone(), orchestrator.clone());
    (store, cms, orchestrator, redriver)
}

fn seed_despacho(store: &InMemoryStore) -> core_kernel::DespachoId {
    let despacho = DespachoBuilder::new().build();
    let id = despacho.id;
    store.seed_sede(SedeBuilder::for_despacho(id).build());
    store.seed_despacho(despacho);
    id
}

/// A due entry whose push now succeeds is resolved
#[tokio::test]
async fn test_redrive_resolves_recovered_entry() {
    let (store, cms, orchestrator, redriver) = engine_with(SyncConfig::default());
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);

    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(10);
    let report = redriver.run_once(later).await.unwrap();
    assert_eq!(report.selected, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.died, 0);

    let entries = store.queue_entries();
    assert_eq!(entries[0].status, QueueStatus::Resolved);
    assert!(store.get_despacho(id).unwrap().last_sync_succeeded);
}

/// Entries are not selected before their next attempt time
#[tokio::test]
async fn test_redrive_respects_next_attempt_at() {
    let (store, cms, orchestrator, redriver) = engine_with(SyncConfig::default());
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);

    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let report = redriver.run_once(Utc::now()).await.unwrap();
    assert_eq!(report.selected, 0);
    assert!(store.queue_entries()[0].status.is_live());
}

/// Still-failing entries are rescheduled with an incremented counter
#[tokio::test]
async fn test_redrive_reschedules_on_renewed_failure() {
    let (store, cms, orchestrator, redriver) = engine_with(SyncConfig::default());
    let id = seed_despacho(&store);
    cms.script_transient_failures(2);

    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(10);
    let report = redriver.run_once(later).await.unwrap();
    assert_eq!(report.rescheduled, 1);
    assert_eq!(report.died, 0);

    let entries = store.queue_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempts, 2);
    assert!(entries[0].status.is_live());
}

/// Beyond the attempt ceiling the entry dies and stops being selected
#[tokio::test]
async fn test_entry_dies_at_attempt_ceiling() {
    let config = SyncConfig {
        max_attempts: 2,
        ..Default::default()
    };
    let (store, cms, orchestrator, redriver) = engine_with(config);
    let id = seed_despacho(&store);
    cms.script_transient_failures(10);
    let mut events = orchestrator.subscribe();

    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(10);
    let report = redriver.run_once(later).await.unwrap();
    assert_eq!(report.died, 1);

    let entries = store.queue_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, QueueStatus::Dead);
    assert_eq!(entries[0].attempts, 2);

    // Dead entries are never selected again
    let much_later = later + Duration::hours(1);
    let report = redriver.run_once(much_later).await.unwrap();
    assert_eq!(report.selected, 0);

    // Drain events until the death notice
    let died = std::iter::from_fn(|| events.try_recv().ok())
        .find(|e| matches!(e, SyncEvent::QueueEntryDied { .. }));
    assert!(died.is_some());
}

/// A fatally-failing entry (vanished despacho) dies immediately
#[tokio::test]
async fn test_fatal_redrive_kills_entry() {
    let (store, cms, orchestrator, redriver) = engine_with(SyncConfig::default());

    // Uncorrelated despacho fails its push, then is deleted locally
    let despacho = DespachoBuilder::new().build();
    let id = despacho.id;
    store.seed_despacho(despacho);
    cms.script_transient_failures(1);
    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();
    use domain_sync::StorePort;
    store.delete_despacho(id).await.unwrap();

    let later = Utc::now() + Duration::minutes(10);
    let report = redriver.run_once(later).await.unwrap();
    assert_eq!(report.died, 1);
    assert_eq!(store.queue_entries()[0].status, QueueStatus::Dead);
}

/// A foreground sync and a re-drive for the same despacho can run together
#[tokio::test]
async fn test_redrive_is_safe_with_foreground_sync() {
    let (store, cms, orchestrator, redriver) = engine_with(SyncConfig::default());
    let id = seed_despacho(&store);
    cms.script_transient_failures(1);

    orchestrator
        .sync_outbound(id, &CancellationToken::new())
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(10);
    let cancel = CancellationToken::new();
    let (foreground, redrive) = tokio::join!(
        orchestrator.sync_outbound(id, &cancel),
        redriver.run_once(later),
    );

    assert!(matches!(
        foreground.unwrap(),
        OutboundOutcome::Completed { .. }
    ));
    redrive.unwrap();

    let despacho = store.get_despacho(id).unwrap();
    assert!(despacho.cms_id.is_some());
    assert!(despacho.last_sync_succeeded);
    assert!(store
        .queue_entries()
        .iter()
        .all(|e| !e.status.is_live()));
}
