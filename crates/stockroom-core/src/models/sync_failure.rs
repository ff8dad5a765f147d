//! Sync failure model

use super::OperationKind;

/// A queued operation the remote catalog rejected permanently.
///
/// Kept until the user retries or discards it, so the local edit is never
/// silently lost.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    /// Failure row identifier
    pub id: i64,
    /// Sequence number the operation had in the log
    pub operation_seq: i64,
    /// The rejected operation
    pub kind: OperationKind,
    /// Reason reported by the remote catalog
    pub reason: String,
    /// Rejection timestamp (Unix ms)
    pub failed_at: i64,
}
