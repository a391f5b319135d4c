//! Port traits the synchronization core depends on
//!
//! The orchestrator is constructed over these traits so the PostgreSQL and
//! CMS adapters can be substituted with test doubles. All implementations
//! report failures as [`PortError`]; classification (retry vs fatal) is the
//! orchestrator's job, never the adapter's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{CmsId, DespachoId, DomainPort, PortError, SedeId, SyncEntryId};

use crate::model::{
    Correlation, Despacho, DespachoAggregate, PublicationState, Sede, SyncAction, SyncQueueEntry,
    VerificationState,
};
use crate::transform::{CmsDespachoDoc, SedeData};

/// Data for creating a despacho row
///
/// `cms_id` is present on the inbound-import path only; the Store enforces
/// its uniqueness with a constraint, and the losing insert of a concurrent
/// import surfaces as [`PortError::Conflict`].
#[derive(Debug, Clone)]
pub struct NewDespacho {
    pub cms_id: Option<CmsId>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub verification: VerificationState,
    pub publication: PublicationState,
}

/// Data for creating a sede row
#[derive(Debug, Clone)]
pub struct NewSede {
    pub despacho_id: DespachoId,
    pub is_principal: bool,
    pub data: SedeData,
}

/// Receipt returned by the CMS for an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushReceipt {
    pub cms_id: CmsId,
    /// True when the push created a new post rather than updating one
    pub created: bool,
}

/// Canonical Store access used by the sync core
#[async_trait]
pub trait StorePort: DomainPort {
    /// Fetches a despacho with its active sedes
    async fn get_aggregate(&self, id: DespachoId) -> Result<DespachoAggregate, PortError>;

    /// Looks up the despacho correlated with a CMS id, if any
    async fn find_by_cms_id(&self, cms_id: CmsId)
        -> Result<Option<DespachoAggregate>, PortError>;

    /// Inserts a despacho row; a duplicate `cms_id` is a Conflict
    async fn create_despacho(&self, new: NewDespacho) -> Result<Despacho, PortError>;

    /// Inserts a sede row
    async fn create_sede(&self, new: NewSede) -> Result<Sede, PortError>;

    /// Updates verification/publication state
    ///
    /// The mutation commits and is visible to readers regardless of any
    /// follow-up push; it also clears `last_sync_succeeded` until the new
    /// version is echoed by a successful push.
    async fn update_states(
        &self,
        id: DespachoId,
        verification: Option<VerificationState>,
        publication: Option<PublicationState>,
    ) -> Result<Despacho, PortError>;

    /// Records the correlation after an outbound push created the CMS post
    ///
    /// Set-once: if the despacho already carries this `cms_id` the call is
    /// idempotent; if it carries a different one, the existing correlation
    /// wins and is returned. A `cms_id` owned by another despacho is a
    /// Conflict.
    async fn assign_correlation(
        &self,
        id: DespachoId,
        cms_id: CmsId,
    ) -> Result<Correlation, PortError>;

    /// Records the outcome of the most recent outbound attempt
    async fn set_sync_outcome(
        &self,
        id: DespachoId,
        succeeded: bool,
        at: DateTime<Utc>,
    ) -> Result<(), PortError>;

    /// Creates or refreshes the single live queue entry for (despacho, action)
    ///
    /// Increments the attempt counter, stores the error, and schedules the
    /// next attempt. Never produces a second live entry for the same key.
    async fn upsert_queue_entry(
        &self,
        despacho_id: DespachoId,
        action: SyncAction,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<SyncQueueEntry, PortError>;

    /// Marks the live queue entry for (despacho, action) resolved, if any
    async fn resolve_queue_entry(
        &self,
        despacho_id: DespachoId,
        action: SyncAction,
    ) -> Result<(), PortError>;

    /// Selects live entries whose `next_attempt_at` has passed
    async fn due_queue_entries(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SyncQueueEntry>, PortError>;

    /// Marks an entry dead; dead entries are never selected again
    async fn mark_queue_dead(&self, id: SyncEntryId, error: &str) -> Result<(), PortError>;

    /// Deletes a despacho; refused while a `cms_id` is set
    async fn delete_despacho(&self, id: DespachoId) -> Result<(), PortError>;

    /// Deactivates a sede (kept for history, excluded from aggregates)
    async fn deactivate_sede(&self, id: SedeId) -> Result<(), PortError>;
}

/// External CMS access used by the sync core
#[async_trait]
pub trait CmsPort: DomainPort {
    /// Creates or updates the despacho post
    ///
    /// Issues a create when the document has no id, an update otherwise.
    async fn push_upsert(&self, doc: &CmsDespachoDoc) -> Result<PushReceipt, PortError>;

    /// Fetches a single document by CMS id
    async fn fetch_by_id(&self, id: CmsId) -> Result<CmsDespachoDoc, PortError>;

    /// Full-text search; ordering is CMS-default and not guaranteed stable
    async fn search_by_text(
        &self,
        query: &str,
        per_page: u32,
    ) -> Result<Vec<CmsDespachoDoc>, PortError>;

    /// Total number of published despacho posts
    ///
    /// The CMS reports this in a response header; a missing or malformed
    /// header is zero, never an error.
    async fn count_published(&self) -> Result<u64, PortError>;
}
