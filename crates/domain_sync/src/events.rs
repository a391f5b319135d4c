//! Domain events emitted by the synchronization core
//!
//! Events decouple best-effort side effects (operator notifications, cache
//! warming) from the sync operation itself: emission is fire-and-forget
//! over a broadcast channel and a sync's success is never gated on any
//! subscriber.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CmsId, DespachoId};

use crate::model::SyncAction;

/// Events emitted as sync operations progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// An outbound push reached the CMS
    PushSucceeded {
        despacho_id: DespachoId,
        cms_id: CmsId,
        created: bool,
        timestamp: DateTime<Utc>,
    },

    /// An outbound push failed transiently and was queued for re-drive
    PushFailed {
        despacho_id: DespachoId,
        error: String,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// An inbound document created a new local despacho
    Imported {
        despacho_id: DespachoId,
        cms_id: CmsId,
        with_sede: bool,
        timestamp: DateTime<Utc>,
    },

    /// A partial import gained its missing principal sede
    ImportCompleted {
        despacho_id: DespachoId,
        cms_id: CmsId,
        timestamp: DateTime<Utc>,
    },

    /// A queue entry exhausted its attempts and needs operator attention
    QueueEntryDied {
        despacho_id: DespachoId,
        action: SyncAction,
        attempts: u32,
        last_error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Default capacity for the sync event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize() {
        let event = SyncEvent::PushSucceeded {
            despacho_id: DespachoId::new(),
            cms_id: CmsId::new(1001),
            created: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("PushSucceeded"));
        assert!(json.contains("1001"));
    }
}
