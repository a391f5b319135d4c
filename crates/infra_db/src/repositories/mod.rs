//! Database repositories

pub mod despacho;
pub mod sede;
pub mod sync_queue;

pub use despacho::{DespachoRepository, DespachoRow};
pub use sede::{SedeRepository, SedeRow};
pub use sync_queue::{SyncQueueRepository, SyncQueueRow};
