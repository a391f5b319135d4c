//! Canonical data model for the despacho aggregate and the sync queue
//!
//! The Store owns these shapes. The CMS-side document shapes live in
//! [`crate::transform`], with one pure mapping between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{CmsId, DespachoId, SearchIndexId, SedeId, SyncEntryId};

/// Verification workflow state of a despacho
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Unverified,
    Pending,
    Verified,
}

/// Publication state of a despacho
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    Draft,
    Published,
    Unlisted,
}

/// A law-firm directory entry (aggregate root)
///
/// Carries the correlation with its two external representations: the CMS
/// post (`cms_id`, set at most once) and the search-index document
/// (`search_index_id`, derived from the CMS id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Despacho {
    pub id: DespachoId,
    pub cms_id: Option<CmsId>,
    pub search_index_id: Option<SearchIndexId>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub verification: VerificationState,
    pub publication: PublicationState,
    /// True only while the most recent outbound push of the current local
    /// version succeeded; cleared by any local mutation of CMS-owned fields.
    pub last_sync_succeeded: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Despacho {
    /// Returns the correlation triple when this despacho is linked to the CMS
    pub fn correlation(&self) -> Option<Correlation> {
        self.cms_id.map(|cms_id| Correlation {
            despacho_id: self.id,
            cms_id,
            search_index_id: cms_id.search_index_id(),
        })
    }
}

/// Weekly schedule entry for a sede
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Day name as published (e.g. "lunes")
    pub day: String,
    /// Opening hours as published (e.g. "09:00-18:00")
    pub hours: String,
}

/// Social/web presence links for a sede
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
}

/// A physical office location belonging to a despacho
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sede {
    pub id: SedeId,
    pub despacho_id: DespachoId,
    /// At most one active sede per despacho may be principal
    pub is_principal: bool,
    pub street: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub practice_areas: Vec<String>,
    pub schedule: Vec<ScheduleEntry>,
    pub social: SocialLinks,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A despacho together with its active sedes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DespachoAggregate {
    pub despacho: Despacho,
    pub sedes: Vec<Sede>,
}

impl DespachoAggregate {
    pub fn principal_sede(&self) -> Option<&Sede> {
        self.sedes
            .iter()
            .find(|s| s.is_principal && s.active)
            .or_else(|| self.sedes.iter().find(|s| s.active))
    }

    /// A despacho counts as imported only when it is correlated AND has at
    /// least one sede; a correlated record with zero sedes is a partial
    /// import that the next inbound attempt completes.
    pub fn is_imported(&self) -> bool {
        self.despacho.cms_id.is_some() && !self.sedes.is_empty()
    }
}

/// The maintained mapping between a despacho's three representations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub despacho_id: DespachoId,
    pub cms_id: CmsId,
    pub search_index_id: SearchIndexId,
}

/// Kind of sync work a queue entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Push,
    Import,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Push => write!(f, "push"),
            SyncAction::Import => write!(f, "import"),
        }
    }
}

/// Lifecycle state of a queue entry
///
/// Serialized with the Spanish names used on the persisted record and the
/// operator-facing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "fallido")]
    Failed,
    #[serde(rename = "resuelto")]
    Resolved,
    #[serde(rename = "muerto")]
    Dead,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueStatus::Pending => "pendiente",
            QueueStatus::Failed => "fallido",
            QueueStatus::Resolved => "resuelto",
            QueueStatus::Dead => "muerto",
        };
        write!(f, "{}", s)
    }
}

impl QueueStatus {
    /// Entries in a live state are eligible for re-drive selection
    pub fn is_live(&self) -> bool {
        matches!(self, QueueStatus::Pending | QueueStatus::Failed)
    }
}

/// Durable record of a failed outbound attempt awaiting re-drive
///
/// Keyed by (despacho_id, action): repeated failures for the same pending
/// work update the single live entry instead of accumulating duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub id: SyncEntryId,
    pub despacho_id: DespachoId,
    pub action: SyncAction,
    pub status: QueueStatus,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
