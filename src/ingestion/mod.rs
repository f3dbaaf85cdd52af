pub mod orchestrator;
pub mod snapshot;

pub use orchestrator::{IngestionOrchestrator, SnapshotCallback, SystemStatus};
pub use snapshot::{InstrumentPoint, Snapshot, SnapshotHistory};
