//! Sync orchestrator
//!
//! Sequences fetch → transform → push → confirm → persist-correlation for
//! both directions. The orchestrator alone decides retry-vs-fatal: adapters
//! return typed outcomes and never classify. Outbound pushes run under a
//! bounded timeout and race a cancellation token so a locally-deleted
//! despacho can abort its in-flight push.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use core_kernel::{CmsId, DespachoId, PortError};

use crate::correlator::{Correlator, ImportDecision};
use crate::error::SyncError;
use crate::events::{SyncEvent, EVENT_CHANNEL_CAPACITY};
use crate::model::{Correlation, SyncAction, SyncQueueEntry};
use crate::ports::{CmsPort, NewDespacho, NewSede, StorePort};
use crate::transform::{self, CmsDespachoDoc, ImportCandidate};

/// Tunables for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on a single CMS push
    pub push_timeout: Duration,
    /// Delay before a failed push becomes due for re-drive
    pub retry_delay: Duration,
    /// Attempts after which a queue entry is marked dead
    pub max_attempts: u32,
    /// Re-drive batch size
    pub queue_batch: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(300),
            max_attempts: 5,
            queue_batch: 20,
        }
    }
}

/// Phases of an outbound sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchLocal,
    Transform,
    Push,
    Confirm,
    Done,
    Failed,
}

impl SyncPhase {
    /// The legal transition table; every edge the engine takes is listed here
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        matches!(
            (self, next),
            (SyncPhase::Idle, SyncPhase::FetchLocal)
                | (SyncPhase::FetchLocal, SyncPhase::Transform)
                | (SyncPhase::FetchLocal, SyncPhase::Failed)
                | (SyncPhase::Transform, SyncPhase::Push)
                | (SyncPhase::Push, SyncPhase::Confirm)
                | (SyncPhase::Push, SyncPhase::Failed)
                | (SyncPhase::Confirm, SyncPhase::Done)
        )
    }
}

/// Result of an outbound sync attempt
#[derive(Debug, Clone)]
pub enum OutboundOutcome {
    /// The push reached the CMS and the correlation is persisted
    Completed { cms_id: CmsId, created: bool },
    /// The push failed transiently; the single live queue entry for this
    /// despacho+action was created or refreshed
    Enqueued {
        entry: SyncQueueEntry,
        error: String,
    },
    /// The push was aborted by its cancellation token
    Cancelled,
}

/// Result of an inbound import
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    /// A new local despacho was created
    Imported {
        despacho_id: DespachoId,
        correlation: Correlation,
        with_sede: bool,
    },
    /// An existing partial record was targeted; `sede_added` tells whether
    /// this payload carried the locality data needed to complete it
    Completed {
        despacho_id: DespachoId,
        correlation: Correlation,
        sede_added: bool,
    },
    /// The record is fully imported; local metadata is left untouched
    AlreadyImported(Correlation),
}

/// Sequences sync operations between the Store and the CMS
pub struct SyncOrchestrator {
    store: Arc<dyn StorePort>,
    cms: Arc<dyn CmsPort>,
    correlator: Correlator,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn StorePort>, cms: Arc<dyn CmsPort>, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            correlator: Correlator::new(store.clone()),
            store,
            cms,
            config,
            events,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Subscribes to sync events; slow subscribers never block the engine
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // No subscriber is fine; emission is best-effort by design of the
        // broadcast channel, not a delivery guarantee.
        let _ = self.events.send(event);
    }

    pub(crate) fn emit_event(&self, event: SyncEvent) {
        self.emit(event);
    }

    fn advance(&self, phase: &mut SyncPhase, next: SyncPhase, id: DespachoId) {
        debug_assert!(
            phase.can_transition_to(next),
            "illegal sync transition {:?} -> {:?}",
            phase,
            next
        );
        tracing::debug!(despacho_id = %id, from = ?phase, to = ?next, "sync transition");
        *phase = next;
    }

    /// Pushes the current local state of a despacho to the CMS
    ///
    /// Fatal outcomes (missing aggregate, rejected payload, credential
    /// problems) return an error and leave no queue entry. Transient
    /// outcomes return [`OutboundOutcome::Enqueued`].
    pub async fn sync_outbound(
        &self,
        id: DespachoId,
        cancel: &CancellationToken,
    ) -> Result<OutboundOutcome, SyncError> {
        let mut phase = SyncPhase::Idle;

        self.advance(&mut phase, SyncPhase::FetchLocal, id);
        let aggregate = match self.store.get_aggregate(id).await {
            Ok(aggregate) => aggregate,
            Err(e) => {
                self.advance(&mut phase, SyncPhase::Failed, id);
                return Err(if e.is_not_found() {
                    SyncError::not_found(format!("despacho {} does not exist", id))
                } else {
                    e.into()
                });
            }
        };

        self.advance(&mut phase, SyncPhase::Transform, id);
        let doc = transform::to_cms(&aggregate);

        self.advance(&mut phase, SyncPhase::Push, id);
        let pushed = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(despacho_id = %id, "outbound push cancelled");
                return Ok(OutboundOutcome::Cancelled);
            }
            result = tokio::time::timeout(self.config.push_timeout, self.cms.push_upsert(&doc)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(PortError::Timeout {
                        operation: "push_upsert".to_string(),
                        duration_ms: self.config.push_timeout.as_millis() as u64,
                    }),
                }
            }
        };

        match pushed {
            Ok(receipt) => {
                self.advance(&mut phase, SyncPhase::Confirm, id);
                self.confirm_push(id, aggregate.despacho.cms_id, receipt.cms_id, receipt.created)
                    .await?;
                self.advance(&mut phase, SyncPhase::Done, id);
                Ok(OutboundOutcome::Completed {
                    cms_id: receipt.cms_id,
                    created: receipt.created,
                })
            }
            Err(e) if e.is_transient() => {
                self.advance(&mut phase, SyncPhase::Failed, id);
                self.enqueue_push_failure(id, &e).await
            }
            Err(e) => {
                self.advance(&mut phase, SyncPhase::Failed, id);
                tracing::error!(despacho_id = %id, error = %e, "outbound push failed fatally");
                Err(match e {
                    PortError::Unauthorized { message } => SyncError::AuthConfig(message),
                    PortError::Validation { message, .. } => SyncError::Rejected(message),
                    PortError::Transformation { message } => SyncError::Rejected(message),
                    other => other.into(),
                })
            }
        }
    }

    async fn confirm_push(
        &self,
        id: DespachoId,
        known_cms_id: Option<CmsId>,
        pushed_cms_id: CmsId,
        created: bool,
    ) -> Result<(), SyncError> {
        if known_cms_id.is_none() {
            match self.store.assign_correlation(id, pushed_cms_id).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    return Err(SyncError::internal(format!(
                        "cms id {} returned for despacho {} is correlated with another despacho",
                        pushed_cms_id, id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let now = Utc::now();
        self.store.set_sync_outcome(id, true, now).await?;
        self.store.resolve_queue_entry(id, SyncAction::Push).await?;
        self.emit(SyncEvent::PushSucceeded {
            despacho_id: id,
            cms_id: pushed_cms_id,
            created,
            timestamp: now,
        });
        tracing::info!(despacho_id = %id, cms_id = %pushed_cms_id, created, "outbound push confirmed");
        Ok(())
    }

    async fn enqueue_push_failure(
        &self,
        id: DespachoId,
        error: &PortError,
    ) -> Result<OutboundOutcome, SyncError> {
        let now = Utc::now();
        let delay = chrono::Duration::from_std(self.config.retry_delay)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let message = error.to_string();

        self.store.set_sync_outcome(id, false, now).await?;
        let entry = self
            .store
            .upsert_queue_entry(id, SyncAction::Push, &message, now + delay)
            .await?;

        tracing::warn!(
            despacho_id = %id,
            error = %message,
            attempts = entry.attempts,
            next_attempt_at = %entry.next_attempt_at,
            "outbound push failed; queued for re-drive"
        );
        self.emit(SyncEvent::PushFailed {
            despacho_id: id,
            error: message.clone(),
            attempts: entry.attempts,
            next_attempt_at: entry.next_attempt_at,
            timestamp: now,
        });
        Ok(OutboundOutcome::Enqueued {
            entry,
            error: message,
        })
    }

    /// Imports an inbound CMS document, deduplicated via the correlator
    ///
    /// Already-imported records are a strict no-op on local metadata. A
    /// lost insert race on the `cms_id` constraint is redirected onto the
    /// completion path instead of surfacing as an error.
    pub async fn import_inbound(&self, doc: &CmsDespachoDoc) -> Result<ImportOutcome, SyncError> {
        let cms_id = doc
            .id
            .ok_or_else(|| SyncError::validation("inbound payload is missing the external id"))?;
        let candidate = transform::from_cms(doc);
        if candidate.name.is_empty() {
            return Err(SyncError::validation("inbound payload has an empty title"));
        }

        match self.correlator.resolve(cms_id).await? {
            ImportDecision::AlreadyImported(correlation) => {
                tracing::debug!(cms_id = %cms_id, despacho_id = %correlation.despacho_id, "already imported");
                Ok(ImportOutcome::AlreadyImported(correlation))
            }
            ImportDecision::Completable {
                despacho_id,
                correlation,
            } => {
                self.complete_import(despacho_id, correlation, &candidate)
                    .await
            }
            ImportDecision::New => self.create_import(cms_id, &candidate).await,
        }
    }

    /// Fetches a document from the CMS by id, then imports it
    pub async fn import_remote(&self, cms_id: CmsId) -> Result<ImportOutcome, SyncError> {
        let doc = self.cms.fetch_by_id(cms_id).await?;
        self.import_inbound(&doc).await
    }

    async fn create_import(
        &self,
        cms_id: CmsId,
        candidate: &ImportCandidate,
    ) -> Result<ImportOutcome, SyncError> {
        let new = NewDespacho {
            cms_id: Some(cms_id),
            name: candidate.name.clone(),
            slug: candidate.slug.clone(),
            description: candidate.description.clone(),
            verification: candidate.verification,
            publication: candidate.publication,
        };

        let despacho = match self.store.create_despacho(new).await {
            Ok(despacho) => despacho,
            Err(e) if e.is_conflict() => {
                // Lost the check-then-act race: a concurrent import inserted
                // this cms_id first. The constraint is the race breaker;
                // fall through to the winner's record.
                tracing::info!(cms_id = %cms_id, "concurrent import won the insert; completing instead");
                return match self.correlator.resolve(cms_id).await? {
                    ImportDecision::AlreadyImported(correlation) => {
                        Ok(ImportOutcome::AlreadyImported(correlation))
                    }
                    ImportDecision::Completable {
                        despacho_id,
                        correlation,
                    } => {
                        self.complete_import(despacho_id, correlation, candidate)
                            .await
                    }
                    ImportDecision::New => Err(SyncError::internal(format!(
                        "insert of cms id {} conflicted but no correlated despacho exists",
                        cms_id
                    ))),
                };
            }
            Err(e) => return Err(e.into()),
        };

        let correlation = despacho.correlation().ok_or_else(|| {
            SyncError::internal(format!(
                "created despacho {} is missing its correlation",
                despacho.id
            ))
        })?;

        let mut with_sede = false;
        if let Some(sede) = &candidate.principal_sede {
            match self
                .store
                .create_sede(NewSede {
                    despacho_id: despacho.id,
                    is_principal: true,
                    data: sede.clone(),
                })
                .await
            {
                Ok(_) => with_sede = true,
                Err(e) => {
                    // Non-fatal: a correlated despacho with zero sedes stays
                    // eligible for completion on the next import attempt.
                    tracing::warn!(
                        despacho_id = %despacho.id,
                        cms_id = %cms_id,
                        error = %e,
                        "sede creation failed after despacho creation"
                    );
                }
            }
        }

        let now = Utc::now();
        self.emit(SyncEvent::Imported {
            despacho_id: despacho.id,
            cms_id,
            with_sede,
            timestamp: now,
        });
        tracing::info!(despacho_id = %despacho.id, cms_id = %cms_id, with_sede, "imported despacho");
        Ok(ImportOutcome::Imported {
            despacho_id: despacho.id,
            correlation,
            with_sede,
        })
    }

    async fn complete_import(
        &self,
        despacho_id: DespachoId,
        correlation: Correlation,
        candidate: &ImportCandidate,
    ) -> Result<ImportOutcome, SyncError> {
        let Some(sede) = &candidate.principal_sede else {
            // Still no locality data; the record stays partial and no
            // duplicate is created.
            return Ok(ImportOutcome::Completed {
                despacho_id,
                correlation,
                sede_added: false,
            });
        };

        self.store
            .create_sede(NewSede {
                despacho_id,
                is_principal: true,
                data: sede.clone(),
            })
            .await?;

        let now = Utc::now();
        self.emit(SyncEvent::ImportCompleted {
            despacho_id,
            cms_id: correlation.cms_id,
            timestamp: now,
        });
        tracing::info!(despacho_id = %despacho_id, cms_id = %correlation.cms_id, "completed partial import");
        Ok(ImportOutcome::Completed {
            despacho_id,
            correlation,
            sede_added: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use SyncPhase::*;
        let legal = [
            (Idle, FetchLocal),
            (FetchLocal, Transform),
            (FetchLocal, Failed),
            (Transform, Push),
            (Push, Confirm),
            (Push, Failed),
            (Confirm, Done),
        ];
        for (from, to) in legal {
            assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
        }

        let illegal = [
            (Idle, Push),
            (Transform, Failed),
            (Push, Done),
            (Done, Idle),
            (Failed, Push),
            (Confirm, Failed),
        ];
        for (from, to) in illegal {
            assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
        }
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.push_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_delay, Duration::from_secs(300));
        assert_eq!(config.max_attempts, 5);
    }
}
