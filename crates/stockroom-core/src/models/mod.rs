//! Data models for Stockroom

mod operation;
mod product;
mod sync_failure;

pub use operation::{Operation, OperationAction, OperationKind};
pub use product::{Product, ProductDraft, ProductId, SyncStatus};
pub use sync_failure::SyncFailure;
