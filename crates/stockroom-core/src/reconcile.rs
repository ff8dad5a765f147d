//! Reconciliation rules.
//!
//! Pure decision logic used by the sync engine: recognizing temporary
//! identifiers, rewriting them once the server has assigned a real one, and
//! deciding whether authoritative server state replaces a local record. All
//! I/O stays in the engine so these rules can be tested on plain values.

use std::collections::{HashMap, HashSet};

use crate::models::{Product, ProductId, SyncStatus};
use crate::remote::RemoteProduct;

/// Whether `id` was generated locally and never acknowledged by the server
pub fn is_temporary(id: &ProductId) -> bool {
    id.is_temporary()
}

/// Known `temp_id -> server_id` assignments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    entries: HashMap<ProductId, ProductId>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, temp_id: ProductId, server_id: ProductId) {
        self.entries.insert(temp_id, server_id);
    }

    pub fn get(&self, temp_id: &ProductId) -> Option<&ProductId> {
        self.entries.get(temp_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ProductId, ProductId)> for IdMapping {
    fn from_iter<I: IntoIterator<Item = (ProductId, ProductId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Rewrite a temporary identifier to its server identifier when known
pub fn remap(id: &ProductId, mapping: &IdMapping) -> ProductId {
    if is_temporary(id) {
        if let Some(server_id) = mapping.get(id) {
            return server_id.clone();
        }
    }
    id.clone()
}

/// Remote data wins unless a local operation for the record is outstanding.
///
/// Whole-record replacement; there is no field-level merge.
pub const fn should_overwrite_with_remote(_local: Option<&Product>, has_pending_op: bool) -> bool {
    !has_pending_op
}

/// Changes a pull-and-merge pass applies to the local store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Records to write as the remote version (new or changed)
    pub upserts: Vec<Product>,
    /// Local records that no longer exist remotely
    pub removals: Vec<ProductId>,
    /// Records left untouched because local edits are outstanding
    pub kept_local: Vec<ProductId>,
    /// Records already identical to the remote version
    pub unchanged: usize,
}

/// Decide how to fold a full remote listing into the local records.
///
/// `protected` holds the (server) ids still referenced by a queued operation
/// or an outstanding failure. Temporary records are never removed.
pub fn plan_merge(
    local: &[Product],
    remote: Vec<RemoteProduct>,
    protected: &HashSet<ProductId>,
) -> MergePlan {
    let by_id: HashMap<&ProductId, &Product> =
        local.iter().map(|product| (&product.id, product)).collect();
    let remote_ids: HashSet<ProductId> = remote.iter().map(|item| item.id.clone()).collect();
    let mut plan = MergePlan::default();

    for item in remote {
        let existing = by_id.get(&item.id).copied();
        if !should_overwrite_with_remote(existing, protected.contains(&item.id)) {
            plan.kept_local.push(item.id);
            continue;
        }
        if existing.is_some_and(|product| matches_remote(product, &item)) {
            plan.unchanged += 1;
            continue;
        }
        plan.upserts.push(item.into_product());
    }

    for product in local {
        if remote_ids.contains(&product.id) || is_temporary(&product.id) {
            continue;
        }
        if protected.contains(&product.id) {
            plan.kept_local.push(product.id.clone());
        } else {
            plan.removals.push(product.id.clone());
        }
    }

    plan
}

fn matches_remote(product: &Product, remote: &RemoteProduct) -> bool {
    product.sync_status == SyncStatus::Synced && !product.is_deleted && product.draft() == remote.fields
}
