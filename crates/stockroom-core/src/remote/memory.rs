//! In-process remote catalog.
//!
//! Behaves like the REST backend (server-assigned ids, 404 on unknown
//! updates, idempotent deletes) and can be scripted to fail, which makes it
//! the transport of choice for engine tests and offline demos.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{RemoteCatalog, RemoteError, RemoteProduct};
use crate::models::{ProductDraft, ProductId};

/// A request received by [`MemoryRemoteCatalog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create { name: String },
    Update { id: ProductId },
    Delete { id: ProductId },
    List,
}

impl RemoteCall {
    const fn kind(&self) -> CallKind {
        match self {
            Self::Create { .. } => CallKind::Create,
            Self::Update { .. } => CallKind::Update,
            Self::Delete { .. } => CallKind::Delete,
            Self::List => CallKind::List,
        }
    }
}

/// Request kinds that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Create,
    Update,
    Delete,
    List,
}

#[derive(Debug, Default)]
struct State {
    products: Vec<RemoteProduct>,
    assigned_ids: VecDeque<ProductId>,
    next_serial: u64,
    failures: VecDeque<(CallKind, RemoteError)>,
    latency: Option<Duration>,
    calls: Vec<RemoteCall>,
}

/// Cloneable handle to a shared in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteCatalog {
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a product as if another client had created it
    pub fn upsert(&self, product: RemoteProduct) {
        let mut state = self.state();
        match state.products.iter_mut().find(|item| item.id == product.id) {
            Some(existing) => *existing = product,
            None => state.products.push(product),
        }
    }

    /// Remove a product as if it had been deleted server-side
    pub fn remove(&self, id: &ProductId) {
        self.state().products.retain(|item| &item.id != id);
    }

    /// Identifiers handed out to the next creates, in order
    pub fn assign_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .assigned_ids
            .extend(ids.into_iter().map(|id| ProductId::new(id)));
    }

    /// Fail the next request of `kind` with `error`
    pub fn fail_next(&self, kind: CallKind, error: RemoteError) {
        self.state().failures.push_back((kind, error));
    }

    /// Delay every request by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    pub fn get(&self, id: &ProductId) -> Option<RemoteProduct> {
        self.state().products.iter().find(|item| &item.id == id).cloned()
    }

    pub fn products(&self) -> Vec<RemoteProduct> {
        self.state().products.clone()
    }

    /// Every request received so far, failed ones included
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Record the call and return a scripted failure, if any
    async fn begin(&self, call: RemoteCall) -> Result<(), RemoteError> {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state();
        let kind = call.kind();
        state.calls.push(call);
        let scripted = state
            .failures
            .iter()
            .position(|(failing, _)| *failing == kind);
        match scripted.and_then(|index| state.failures.remove(index)) {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteCatalog for MemoryRemoteCatalog {
    async fn create(
        &self,
        _collection: &str,
        payload: &ProductDraft,
    ) -> Result<RemoteProduct, RemoteError> {
        self.begin(RemoteCall::Create {
            name: payload.name.clone(),
        })
        .await?;
        let mut state = self.state();
        let id = match state.assigned_ids.pop_front() {
            Some(id) => id,
            None => {
                state.next_serial += 1;
                ProductId::new(format!("srv-{}", state.next_serial))
            }
        };
        let product = RemoteProduct::new(id, payload.clone());
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        _collection: &str,
        id: &ProductId,
        payload: &ProductDraft,
    ) -> Result<RemoteProduct, RemoteError> {
        self.begin(RemoteCall::Update { id: id.clone() }).await?;
        let mut state = self.state();
        let existing = state
            .products
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| RemoteError::permanent(Some(404), format!("Product {id} not found")))?;
        existing.fields = payload.clone();
        Ok(existing.clone())
    }

    async fn delete(&self, _collection: &str, id: &ProductId) -> Result<(), RemoteError> {
        self.begin(RemoteCall::Delete { id: id.clone() }).await?;
        self.remove(id);
        Ok(())
    }

    async fn list(&self, _collection: &str) -> Result<Vec<RemoteProduct>, RemoteError> {
        self.begin(RemoteCall::List).await?;
        Ok(self.products())
    }
}
