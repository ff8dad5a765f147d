//! Sync engine, background scheduler and cycle reports

mod engine;
mod report;
mod scheduler;

pub use engine::{CycleOutcome, Delivery, EngineStatus, SyncEngine, SyncPhase};
pub use report::{MergeSummary, RejectedOperation, SyncReport};
pub use scheduler::SyncScheduler;
