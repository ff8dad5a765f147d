//! Per-cycle sync reporting

use serde::Serialize;
use std::time::Duration;

use crate::models::{OperationAction, ProductId};
use crate::reconcile::MergePlan;

/// An operation the remote catalog rejected during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedOperation {
    pub seq: i64,
    pub action: OperationAction,
    pub target_id: ProductId,
    pub reason: String,
}

/// Outcome of the pull-and-merge phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Records inserted or replaced with the remote version
    pub refreshed: usize,
    /// Records left alone because local edits are outstanding
    pub kept_local: usize,
    /// Records removed because they no longer exist remotely
    pub removed: usize,
    /// Records already identical to the remote version
    pub unchanged: usize,
}

impl From<&MergePlan> for MergeSummary {
    fn from(plan: &MergePlan) -> Self {
        Self {
            refreshed: plan.upserts.len(),
            kept_local: plan.kept_local.len(),
            removed: plan.removals.len(),
            unchanged: plan.unchanged,
        }
    }
}

/// Result of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Operations acknowledged by the remote catalog
    pub applied: usize,
    /// Operations left queued after a transient failure
    pub deferred: usize,
    /// Operations dropped from the log and kept as failures
    pub rejected: Vec<RejectedOperation>,
    /// Temporary ids replaced by server ids
    pub remapped: Vec<(ProductId, ProductId)>,
    /// `None` when the merge was skipped (operations still queued)
    pub merge: Option<MergeSummary>,
    /// Connectivity was lost before every operation was attempted
    pub interrupted: bool,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SyncReport {
    /// Nothing deferred, rejected or interrupted
    pub fn is_clean(&self) -> bool {
        self.deferred == 0 && self.rejected.is_empty() && !self.interrupted
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
