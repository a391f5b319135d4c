//! In-memory port doubles
//!
//! [`InMemoryStore`] mirrors the Store adapter's contract, including the
//! uniqueness constraint on `cms_id` (the import race breaker), set-once
//! correlation semantics, and single-live-queue-entry keying.
//! [`ScriptedCms`] is a programmable CMS that returns scripted outcomes
//! before falling back to auto-assigned ids.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{CmsId, DespachoId, DomainPort, PortError, SedeId, SyncEntryId};
use domain_sync::{
    CmsDespachoDoc, CmsPort, Correlation, Despacho, DespachoAggregate, NewDespacho, NewSede,
    PublicationState, PushReceipt, QueueStatus, Sede, StorePort, SyncAction, SyncQueueEntry,
    VerificationState,
};

#[derive(Default)]
struct StoreState {
    despachos: HashMap<DespachoId, Despacho>,
    sedes: HashMap<SedeId, Sede>,
    queue: Vec<SyncQueueEntry>,
}

/// HashMap-backed [`StorePort`] double
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    fail_next_sede_creations: AtomicU32,
    stale_lookups: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` sede creations fail with an internal error
    pub fn fail_next_sede_creations(&self, n: u32) {
        self.fail_next_sede_creations.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` `find_by_cms_id` calls miss, simulating the stale
    /// read of a check-then-act import race; the uniqueness constraint on
    /// insert still holds
    pub fn stale_lookups(&self, n: u32) {
        self.stale_lookups.store(n, Ordering::SeqCst);
    }

    /// Seeds an existing despacho row
    pub fn seed_despacho(&self, despacho: Despacho) {
        let mut state = self.state.lock().unwrap();
        state.despachos.insert(despacho.id, despacho);
    }

    /// Seeds an existing sede row
    pub fn seed_sede(&self, sede: Sede) {
        let mut state = self.state.lock().unwrap();
        state.sedes.insert(sede.id, sede);
    }

    pub fn despacho_count(&self) -> usize {
        self.state.lock().unwrap().despachos.len()
    }

    pub fn get_despacho(&self, id: DespachoId) -> Option<Despacho> {
        self.state.lock().unwrap().despachos.get(&id).cloned()
    }

    pub fn sede_count_for(&self, id: DespachoId) -> usize {
        self.state
            .lock()
            .unwrap()
            .sedes
            .values()
            .filter(|s| s.despacho_id == id && s.active)
            .count()
    }

    pub fn queue_entries(&self) -> Vec<SyncQueueEntry> {
        self.state.lock().unwrap().queue.clone()
    }

    fn aggregate_locked(state: &StoreState, despacho: &Despacho) -> DespachoAggregate {
        let mut sedes: Vec<Sede> = state
            .sedes
            .values()
            .filter(|s| s.despacho_id == despacho.id && s.active)
            .cloned()
            .collect();
        sedes.sort_by(|a, b| b.is_principal.cmp(&a.is_principal).then(a.created_at.cmp(&b.created_at)));
        DespachoAggregate {
            despacho: despacho.clone(),
            sedes,
        }
    }
}

impl DomainPort for InMemoryStore {}

#[async_trait]
impl StorePort for InMemoryStore {
    async fn get_aggregate(&self, id: DespachoId) -> Result<DespachoAggregate, PortError> {
        let state = self.state.lock().unwrap();
        let despacho = state
            .despachos
            .get(&id)
            .ok_or_else(|| PortError::not_found("Despacho", id))?;
        Ok(Self::aggregate_locked(&state, despacho))
    }

    async fn find_by_cms_id(
        &self,
        cms_id: CmsId,
    ) -> Result<Option<DespachoAggregate>, PortError> {
        let stale = self.stale_lookups.load(Ordering::SeqCst);
        if stale > 0 {
            self.stale_lookups.store(stale - 1, Ordering::SeqCst);
            return Ok(None);
        }
        let state = self.state.lock().unwrap();
        let found = state
            .despachos
            .values()
            .find(|d| d.cms_id == Some(cms_id))
            .cloned();
        Ok(found.map(|d| Self::aggregate_locked(&state, &d)))
    }

    async fn create_despacho(&self, new: NewDespacho) -> Result<Despacho, PortError> {
        let mut state = self.state.lock().unwrap();
        if let Some(cms_id) = new.cms_id {
            if state.despachos.values().any(|d| d.cms_id == Some(cms_id)) {
                return Err(PortError::conflict(format!(
                    "despacho with cms_id {} already exists",
                    cms_id
                )));
            }
        }
        let now = Utc::now();
        let despacho = Despacho {
            id: DespachoId::new(),
            cms_id: new.cms_id,
            search_index_id: new.cms_id.map(|id| id.search_index_id()),
            name: new.name,
            slug: new.slug,
            description: new.description,
            verification: new.verification,
            publication: new.publication,
            last_sync_succeeded: false,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        };
        state.despachos.insert(despacho.id, despacho.clone());
        Ok(despacho)
    }

    async fn create_sede(&self, new: NewSede) -> Result<Sede, PortError> {
        let scripted = self.fail_next_sede_creations.load(Ordering::SeqCst);
        if scripted > 0 {
            self.fail_next_sede_creations
                .store(scripted - 1, Ordering::SeqCst);
            return Err(PortError::internal("scripted sede creation failure"));
        }

        let mut state = self.state.lock().unwrap();
        if !state.despachos.contains_key(&new.despacho_id) {
            return Err(PortError::not_found("Despacho", new.despacho_id));
        }
        if new.is_principal
            && state
                .sedes
                .values()
                .any(|s| s.despacho_id == new.despacho_id && s.is_principal && s.active)
        {
            return Err(PortError::conflict(format!(
                "despacho {} already has a principal sede",
                new.despacho_id
            )));
        }
        let now = Utc::now();
        let sede = Sede {
            id: SedeId::new(),
            despacho_id: new.despacho_id,
            is_principal: new.is_principal,
            street: new.data.street,
            city: new.data.city,
            province: new.data.province,
            postal_code: new.data.postal_code,
            country: new.data.country,
            phone: new.data.phone,
            email: new.data.email,
            practice_areas: new.data.practice_areas,
            schedule: new.data.schedule,
            social: new.data.social,
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.sedes.insert(sede.id, sede.clone());
        Ok(sede)
    }

    async fn update_states(
        &self,
        id: DespachoId,
        verification: Option<VerificationState>,
        publication: Option<PublicationState>,
    ) -> Result<Despacho, PortError> {
        let mut state = self.state.lock().unwrap();
        let despacho = state
            .despachos
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Despacho", id))?;
        if let Some(v) = verification {
            despacho.verification = v;
        }
        if let Some(p) = publication {
            despacho.publication = p;
        }
        despacho.last_sync_succeeded = false;
        despacho.updated_at = Utc::now();
        Ok(despacho.clone())
    }

    async fn assign_correlation(
        &self,
        id: DespachoId,
        cms_id: CmsId,
    ) -> Result<Correlation, PortError> {
        let mut state = self.state.lock().unwrap();
        if state
            .despachos
            .values()
            .any(|d| d.id != id && d.cms_id == Some(cms_id))
        {
            return Err(PortError::conflict(format!(
                "cms_id {} is correlated with another despacho",
                cms_id
            )));
        }
        let despacho = state
            .despachos
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Despacho", id))?;
        match despacho.cms_id {
            // Set-once: an existing correlation wins
            Some(existing) => Ok(Correlation {
                despacho_id: id,
                cms_id: existing,
                search_index_id: existing.search_index_id(),
            }),
            None => {
                despacho.cms_id = Some(cms_id);
                despacho.search_index_id = Some(cms_id.search_index_id());
                despacho.updated_at = Utc::now();
                Ok(Correlation {
                    despacho_id: id,
                    cms_id,
                    search_index_id: cms_id.search_index_id(),
                })
            }
        }
    }

    async fn set_sync_outcome(
        &self,
        id: DespachoId,
        succeeded: bool,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        let despacho = state
            .despachos
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Despacho", id))?;
        despacho.last_sync_succeeded = succeeded;
        despacho.last_sync_at = Some(at);
        Ok(())
    }

    async fn upsert_queue_entry(
        &self,
        despacho_id: DespachoId,
        action: SyncAction,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<SyncQueueEntry, PortError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(entry) = state
            .queue
            .iter_mut()
            .find(|e| e.despacho_id == despacho_id && e.action == action && e.status.is_live())
        {
            entry.status = QueueStatus::Failed;
            entry.last_error = Some(error.to_string());
            entry.next_attempt_at = next_attempt_at;
            entry.attempts += 1;
            entry.updated_at = now;
            return Ok(entry.clone());
        }
        let entry = SyncQueueEntry {
            id: SyncEntryId::new(),
            despacho_id,
            action,
            status: QueueStatus::Failed,
            last_error: Some(error.to_string()),
            next_attempt_at,
            attempts: 1,
            created_at: now,
            updated_at: now,
        };
        state.queue.push(entry.clone());
        Ok(entry)
    }

    async fn resolve_queue_entry(
        &self,
        despacho_id: DespachoId,
        action: SyncAction,
    ) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        for entry in state
            .queue
            .iter_mut()
            .filter(|e| e.despacho_id == despacho_id && e.action == action && e.status.is_live())
        {
            entry.status = QueueStatus::Resolved;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn due_queue_entries(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SyncQueueEntry>, PortError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .queue
            .iter()
            .filter(|e| e.status.is_live() && e.next_attempt_at <= now)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_queue_dead(&self, id: SyncEntryId, error: &str) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .queue
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PortError::not_found("SyncQueueEntry", id))?;
        entry.status = QueueStatus::Dead;
        entry.last_error = Some(error.to_string());
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_despacho(&self, id: DespachoId) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        let despacho = state
            .despachos
            .get(&id)
            .ok_or_else(|| PortError::not_found("Despacho", id))?;
        if despacho.cms_id.is_some() {
            return Err(PortError::conflict(format!(
                "despacho {} is correlated with the CMS and cannot be deleted",
                id
            )));
        }
        state.despachos.remove(&id);
        state.sedes.retain(|_, s| s.despacho_id != id);
        Ok(())
    }

    async fn deactivate_sede(&self, id: SedeId) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        let sede = state
            .sedes
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Sede", id))?;
        sede.active = false;
        sede.updated_at = Utc::now();
        Ok(())
    }
}

/// Programmable [`CmsPort`] double
///
/// Scripted outcomes are consumed first; once the script is exhausted,
/// pushes succeed with auto-assigned ids (create) or echo the document's
/// id (update).
#[derive(Default)]
pub struct ScriptedCms {
    script: Mutex<VecDeque<Result<PushReceipt, PortError>>>,
    docs: Mutex<HashMap<i64, CmsDespachoDoc>>,
    push_log: Mutex<Vec<CmsDespachoDoc>>,
    next_id: AtomicI64,
    total: AtomicU64,
    push_delay: Mutex<Option<std::time::Duration>>,
}

impl ScriptedCms {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Default::default()
        }
    }

    /// Queues an explicit outcome for the next push
    pub fn script_push(&self, outcome: Result<PushReceipt, PortError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Queues `n` transient failures
    pub fn script_transient_failures(&self, n: usize) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..n {
            script.push_back(Err(PortError::ServiceUnavailable {
                service: "cms".to_string(),
            }));
        }
    }

    /// Registers a document served by fetch/search
    pub fn insert_doc(&self, doc: CmsDespachoDoc) {
        if let Some(id) = doc.id {
            self.docs.lock().unwrap().insert(id.value(), doc);
        }
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// Delays every push, keeping it in flight for cancellation/timeout tests
    pub fn set_push_delay(&self, delay: std::time::Duration) {
        *self.push_delay.lock().unwrap() = Some(delay);
    }

    /// Documents pushed so far, in order
    pub fn pushes(&self) -> Vec<CmsDespachoDoc> {
        self.push_log.lock().unwrap().clone()
    }
}

impl DomainPort for ScriptedCms {}

#[async_trait]
impl CmsPort for ScriptedCms {
    async fn push_upsert(&self, doc: &CmsDespachoDoc) -> Result<PushReceipt, PortError> {
        let delay = *self.push_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.push_log.lock().unwrap().push(doc.clone());
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        match doc.id {
            Some(id) => Ok(PushReceipt {
                cms_id: id,
                created: false,
            }),
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(PushReceipt {
                    cms_id: CmsId::new(id),
                    created: true,
                })
            }
        }
    }

    async fn fetch_by_id(&self, id: CmsId) -> Result<CmsDespachoDoc, PortError> {
        self.docs
            .lock()
            .unwrap()
            .get(&id.value())
            .cloned()
            .ok_or_else(|| PortError::not_found("CmsDespachoDoc", id))
    }

    async fn search_by_text(
        &self,
        query: &str,
        per_page: u32,
    ) -> Result<Vec<CmsDespachoDoc>, PortError> {
        let needle = query.to_lowercase();
        Ok(self
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.title.to_lowercase().contains(&needle))
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn count_published(&self) -> Result<u64, PortError> {
        Ok(self.total.load(Ordering::SeqCst))
    }
}
