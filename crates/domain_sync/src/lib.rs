//! Synchronization core for the despacho directory
//!
//! Keeps the canonical Store consistent with the external CMS in both
//! directions:
//!
//! - **Outbound**: local mutations push to the CMS; transient failures
//!   degrade to a durable retry queue instead of blocking the mutation.
//! - **Inbound**: webhook/manual imports create or complete local records,
//!   deduplicated through the identifier correlator.
//!
//! The crate owns the data model, the pure Store↔CMS transform, the
//! correlator, the orchestrator state machine, and the queue re-driver.
//! Store and CMS access go through the port traits in [`ports`] so
//! infrastructure adapters and test doubles are interchangeable.

pub mod correlator;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod ports;
pub mod queue;
pub mod transform;

pub use correlator::{Correlator, ImportDecision};
pub use error::SyncError;
pub use events::SyncEvent;
pub use model::{
    Correlation, Despacho, DespachoAggregate, PublicationState, QueueStatus, ScheduleEntry, Sede,
    SocialLinks, SyncAction, SyncQueueEntry, VerificationState,
};
pub use orchestrator::{
    ImportOutcome, OutboundOutcome, SyncConfig, SyncOrchestrator, SyncPhase,
};
pub use ports::{CmsPort, NewDespacho, NewSede, PushReceipt, StorePort};
pub use queue::{ReDriveReport, ReDriver};
pub use transform::{
    decode_entities, from_cms, slugify, to_cms, CmsDespachoDoc, CmsHorarioDoc, CmsRedesDoc,
    CmsSedeDoc, CmsStatus, ImportCandidate, SedeData,
};
