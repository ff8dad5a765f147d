//! User-facing catalog operations.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::models::{Operation, OperationKind, Product, ProductDraft, ProductId, SyncFailure, SyncStatus};
use crate::remote::RemoteCatalog;
use crate::sync::{CycleOutcome, Delivery, EngineStatus, SyncEngine};
use crate::{Error, Result};

/// Attempts at finding an unused temporary id before giving up
const MAX_ID_ATTEMPTS: usize = 5;

type IdGenerator = Arc<dyn Fn() -> ProductId + Send + Sync>;

/// A local write and what happened to its replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub product: Product,
    pub delivery: Delivery,
}

/// Catalog facade used by front ends.
///
/// Every write lands in the local store and the operation log first, so the
/// caller sees it immediately whether or not the remote catalog is reachable.
pub struct Catalog<R> {
    engine: Arc<SyncEngine<R>>,
    generate_id: IdGenerator,
}

impl<R> fmt::Debug for Catalog<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

impl<R: RemoteCatalog> Catalog<R> {
    pub fn new(engine: Arc<SyncEngine<R>>) -> Self {
        Self {
            engine,
            generate_id: Arc::new(ProductId::temporary),
        }
    }

    /// Replace the temporary id generator
    #[must_use]
    pub fn with_id_generator(
        mut self,
        generate: impl Fn() -> ProductId + Send + Sync + 'static,
    ) -> Self {
        self.generate_id = Arc::new(generate);
        self
    }

    pub const fn engine(&self) -> &Arc<SyncEngine<R>> {
        &self.engine
    }

    // ----- writes -----

    /// Create a product under a fresh temporary id
    pub async fn create(&self, draft: ProductDraft) -> Result<WriteOutcome> {
        draft.validate()?;
        let id = self.allocate_id().await?;
        let product = Product::from_draft(id.clone(), draft.clone(), SyncStatus::Pending);
        let operation = self
            .engine
            .store()
            .write_and_enqueue(
                &product,
                &OperationKind::Create {
                    temp_id: id,
                    payload: draft,
                },
            )
            .await?;
        tracing::debug!("Queued create #{} for {}", operation.seq, product.id);
        self.deliver(product, &operation).await
    }

    /// Replace the fields of an existing product
    pub async fn update(&self, id: &ProductId, draft: ProductDraft) -> Result<WriteOutcome> {
        draft.validate()?;
        let mut product = self.visible(id).await?;
        product.apply_draft(draft.clone());
        product.sync_status = SyncStatus::Pending;
        let operation = self
            .engine
            .store()
            .write_and_enqueue(
                &product,
                &OperationKind::Update {
                    id: product.id.clone(),
                    payload: draft,
                },
            )
            .await?;
        tracing::debug!("Queued update #{} for {}", operation.seq, product.id);
        self.deliver(product, &operation).await
    }

    /// Hide a product and queue its remote delete
    pub async fn delete(&self, id: &ProductId) -> Result<WriteOutcome> {
        let mut product = self.visible(id).await?;
        product.is_deleted = true;
        product.sync_status = SyncStatus::Pending;
        let operation = self
            .engine
            .store()
            .write_and_enqueue(
                &product,
                &OperationKind::Delete {
                    id: product.id.clone(),
                },
            )
            .await?;
        tracing::debug!("Queued delete #{} for {}", operation.seq, product.id);
        self.deliver(product, &operation).await
    }

    // ----- reads -----

    /// Visible product by id; stale temporary ids are followed
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        let id = self.engine.store().resolve_id(id).await?;
        Ok(self
            .engine
            .store()
            .get(&id)
            .await?
            .filter(|product| !product.is_deleted))
    }

    /// Products for display (soft-deleted ones hidden)
    pub async fn list(&self) -> Result<Vec<Product>> {
        self.engine.store().list_visible().await
    }

    /// Every stored record, soft-deleted ones included
    pub async fn list_all(&self) -> Result<Vec<Product>> {
        self.engine.store().list().await
    }

    /// Aggregate "pending sync" indicator
    pub async fn pending_sync(&self) -> Result<bool> {
        self.engine.store().has_pending().await
    }

    // ----- failures -----

    pub async fn failures(&self) -> Result<Vec<SyncFailure>> {
        self.engine.store().list_failures().await
    }

    /// Put a rejected operation back in the log as a new entry
    pub async fn retry_failure(&self, id: i64) -> Result<Operation> {
        let operation = self.engine.store().requeue_failure(id).await?;
        tracing::info!("Requeued sync failure {id} as #{}", operation.seq);
        Ok(operation)
    }

    /// Give up on a rejected operation.
    ///
    /// A discarded create also drops its temporary record together with any
    /// queued operation on it. Other records go back to the server version
    /// on the next merge.
    pub async fn discard_failure(&self, id: i64) -> Result<SyncFailure> {
        let store = self.engine.store();
        let failure = store
            .get_failure(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync failure {id}")))?;
        store.remove_failure(id).await?;

        let target = store.resolve_id(failure.kind.target_id()).await?;
        if matches!(failure.kind, OperationKind::Create { .. }) && target.is_temporary() {
            let orphaned: Vec<i64> = store
                .peek_operations()
                .await?
                .iter()
                .filter(|operation| operation.target_id() == &target)
                .map(|operation| operation.seq)
                .collect();
            store.remove_operations(&orphaned).await?;
            store.delete(&target).await?;
        } else {
            store.settle(std::slice::from_ref(&target)).await?;
        }
        tracing::info!("Discarded sync failure {id} for {target}");
        Ok(failure)
    }

    // ----- sync -----

    pub async fn sync_now(&self) -> Result<CycleOutcome> {
        self.engine.sync_now().await
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        self.engine.status().await
    }

    // ----- helpers -----

    async fn allocate_id(&self) -> Result<ProductId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.generate_id)();
            if !self.engine.store().id_in_use(&id).await? {
                return Ok(id);
            }
            tracing::warn!("Temporary id {id} already in use; regenerating");
        }
        Err(Error::IdentifierConflict(format!(
            "no free temporary id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    async fn visible(&self, id: &ProductId) -> Result<Product> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("product {id}")))
    }

    async fn deliver(&self, product: Product, operation: &Operation) -> Result<WriteOutcome> {
        let delivery = self.engine.submit(operation).await?;
        let product = match delivery {
            Delivery::Synced => {
                let id = self.engine.store().resolve_id(&product.id).await?;
                self.engine.store().get(&id).await?.unwrap_or(product)
            }
            _ => product,
        };
        Ok(WriteOutcome { product, delivery })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::connectivity::ConnectivitySignal;
    use crate::remote::{CallKind, MemoryRemoteCatalog, RemoteError};
    use crate::services::LocalStore;
    use pretty_assertions::assert_eq;

    async fn catalog(online: bool) -> Catalog<MemoryRemoteCatalog> {
        let engine = SyncEngine::new(
            LocalStore::open_in_memory().await.unwrap(),
            MemoryRemoteCatalog::new(),
            ConnectivitySignal::new(online),
            EngineConfig::default(),
        );
        Catalog::new(Arc::new(engine))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_create_is_visible_and_queued() {
        let catalog = catalog(false).await;

        let outcome = catalog
            .create(ProductDraft::new("Widget").with_price(9.5))
            .await
            .unwrap();

        assert_eq!(outcome.delivery, Delivery::Queued);
        assert!(outcome.product.id.is_temporary());
        assert_eq!(outcome.product.sync_status, SyncStatus::Pending);
        assert_eq!(catalog.list().await.unwrap(), vec![outcome.product]);
        assert!(catalog.pending_sync().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_create_is_delivered_immediately() {
        let catalog = catalog(true).await;
        catalog.engine().remote().assign_ids(["abc123"]);

        let outcome = catalog.create(ProductDraft::new("Widget")).await.unwrap();

        assert_eq!(outcome.delivery, Delivery::Synced);
        assert_eq!(outcome.product.id, ProductId::new("abc123"));
        assert_eq!(outcome.product.sync_status, SyncStatus::Synced);
        assert!(!catalog.pending_sync().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_draft_writes_nothing() {
        let catalog = catalog(false).await;

        let result = catalog
            .create(ProductDraft::new("Widget").with_stock(-1))
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(catalog.list_all().await.unwrap().is_empty());
        assert!(!catalog.pending_sync().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn id_collisions_are_regenerated_then_reported() {
        let catalog = catalog(false)
            .await
            .with_id_generator(|| ProductId::new("tmp-fixed"));

        catalog.create(ProductDraft::new("First")).await.unwrap();
        let result = catalog.create(ProductDraft::new("Second")).await;

        assert!(matches!(result, Err(Error::IdentifierConflict(_))));
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_temporary_id_follows_mapping() {
        let catalog = catalog(false).await;
        let created = catalog.create(ProductDraft::new("Widget")).await.unwrap();
        let temp_id = created.product.id;

        catalog.engine().connectivity().set_online(true);
        catalog.sync_now().await.unwrap();

        let updated = catalog
            .update(&temp_id, ProductDraft::new("Widget v2"))
            .await
            .unwrap();
        assert!(!updated.product.id.is_temporary());
        assert_eq!(updated.delivery, Delivery::Synced);
        assert_eq!(
            catalog.get(&temp_id).await.unwrap().map(|product| product.name),
            Some("Widget v2".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_hides_until_acknowledged() {
        let catalog = catalog(false).await;
        let created = catalog.create(ProductDraft::new("Widget")).await.unwrap();

        let deleted = catalog.delete(&created.product.id).await.unwrap();

        assert!(deleted.product.is_deleted);
        assert!(catalog.list().await.unwrap().is_empty());
        assert_eq!(catalog.list_all().await.unwrap().len(), 1);
        assert!(matches!(
            catalog.delete(&created.product.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_write_can_be_retried() {
        let catalog = catalog(true).await;
        catalog.engine().remote().fail_next(
            CallKind::Create,
            RemoteError::permanent(Some(422), "precio must be positive"),
        );

        let outcome = catalog.create(ProductDraft::new("Widget")).await.unwrap();
        assert!(matches!(outcome.delivery, Delivery::Rejected(_)));
        let failures = catalog.failures().await.unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("precio"));

        catalog.retry_failure(failures[0].id).await.unwrap();
        assert!(catalog.failures().await.unwrap().is_empty());
        assert!(catalog.pending_sync().await.unwrap());

        catalog.sync_now().await.unwrap();
        assert!(!catalog.pending_sync().await.unwrap());
        assert_eq!(catalog.engine().remote().products().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn discarded_create_drops_temporary_record() {
        let catalog = catalog(true).await;
        catalog.engine().remote().fail_next(
            CallKind::Create,
            RemoteError::permanent(Some(400), "bad payload"),
        );
        catalog.create(ProductDraft::new("Widget")).await.unwrap();
        let failure_id = catalog.failures().await.unwrap()[0].id;

        catalog.discard_failure(failure_id).await.unwrap();

        assert!(catalog.list_all().await.unwrap().is_empty());
        assert!(catalog.failures().await.unwrap().is_empty());
        assert!(matches!(
            catalog.discard_failure(failure_id).await,
            Err(Error::NotFound(_))
        ));
    }
}
