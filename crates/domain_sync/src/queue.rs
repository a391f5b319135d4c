//! Retry queue re-driver
//!
//! Selects due queue entries and re-runs the outbound flow for each. The
//! re-driver holds no state of its own: coordination with foreground syncs
//! happens entirely through the Store's row state, so running both
//! concurrently for the same despacho is safe (the accepted last-write-wins
//! trade-off on the correlation write applies).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use core_kernel::PortError;

use crate::events::SyncEvent;
use crate::model::{SyncAction, SyncQueueEntry};
use crate::orchestrator::{OutboundOutcome, SyncOrchestrator};
use crate::ports::StorePort;

/// Summary of one re-drive pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReDriveReport {
    pub selected: usize,
    pub resolved: usize,
    pub rescheduled: usize,
    pub died: usize,
}

/// Re-drives failed outbound pushes recorded in the sync queue
pub struct ReDriver {
    store: Arc<dyn StorePort>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl ReDriver {
    pub fn new(store: Arc<dyn StorePort>, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Processes every entry due at `now`
    ///
    /// Renewed transient failures are rescheduled until the attempt ceiling,
    /// then the entry is marked dead and surfaced for operator attention.
    /// Fatal failures (the despacho vanished, the CMS rejects the payload)
    /// kill the entry immediately: retrying cannot fix them.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReDriveReport, PortError> {
        let batch = self.orchestrator.config().queue_batch;
        let due = self.store.due_queue_entries(now, batch).await?;
        let mut report = ReDriveReport {
            selected: due.len(),
            ..Default::default()
        };

        for entry in due {
            match entry.action {
                SyncAction::Push => self.redrive_push(&entry, &mut report).await,
                SyncAction::Import => {
                    // Inbound imports fail synchronously to their callers and
                    // are never enqueued; an import entry is unexpected.
                    tracing::error!(
                        despacho_id = %entry.despacho_id,
                        "import action found in sync queue; marking dead"
                    );
                    self.kill_entry(&entry, "import actions are not re-drivable", &mut report)
                        .await;
                }
            }
        }

        if report.selected > 0 {
            tracing::info!(
                selected = report.selected,
                resolved = report.resolved,
                rescheduled = report.rescheduled,
                died = report.died,
                "re-drive pass finished"
            );
        }
        Ok(report)
    }

    async fn redrive_push(&self, entry: &SyncQueueEntry, report: &mut ReDriveReport) {
        let cancel = CancellationToken::new();
        match self
            .orchestrator
            .sync_outbound(entry.despacho_id, &cancel)
            .await
        {
            Ok(OutboundOutcome::Completed { .. }) => {
                report.resolved += 1;
            }
            Ok(OutboundOutcome::Enqueued {
                entry: refreshed, ..
            }) => {
                let max = self.orchestrator.config().max_attempts;
                if refreshed.attempts >= max {
                    let error = refreshed
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "attempt ceiling reached".to_string());
                    self.kill_entry(&refreshed, &error, report).await;
                } else {
                    report.rescheduled += 1;
                }
            }
            Ok(OutboundOutcome::Cancelled) => {}
            Err(e) => {
                tracing::error!(
                    despacho_id = %entry.despacho_id,
                    error = %e,
                    "re-driven push failed fatally"
                );
                self.kill_entry(entry, &e.to_string(), report).await;
            }
        }
    }

    async fn kill_entry(&self, entry: &SyncQueueEntry, error: &str, report: &mut ReDriveReport) {
        match self.store.mark_queue_dead(entry.id, error).await {
            Ok(()) => {
                report.died += 1;
                tracing::error!(
                    despacho_id = %entry.despacho_id,
                    action = %entry.action,
                    attempts = entry.attempts,
                    error = %error,
                    "sync queue entry marked dead; operator attention required"
                );
                self.orchestrator_emit_death(entry, error);
            }
            Err(e) => {
                tracing::error!(
                    despacho_id = %entry.despacho_id,
                    error = %e,
                    "failed to mark queue entry dead"
                );
            }
        }
    }

    fn orchestrator_emit_death(&self, entry: &SyncQueueEntry, error: &str) {
        self.orchestrator.emit_event(SyncEvent::QueueEntryDied {
            despacho_id: entry.despacho_id,
            action: entry.action,
            attempts: entry.attempts,
            last_error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Periodic re-drive loop; exits when `shutdown` is cancelled
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(interval_secs = interval.as_secs(), "re-driver started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("re-driver shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        tracing::error!(error = %e, "re-drive pass failed");
                    }
                }
            }
        }
    }
}
