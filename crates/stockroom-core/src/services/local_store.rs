//! Owned handle to the local catalog database.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlIdMappingRepository, LibSqlOperationLog, LibSqlProductRepository,
    LibSqlSyncFailureRepository, LibSqlSyncMetaRepository, OperationLog, ProductRepository,
    SyncMetaRepository,
};
use crate::models::{Operation, OperationKind, Product, ProductId, SyncFailure, SyncStatus};
use crate::reconcile::{plan_merge, remap, IdMapping, MergePlan};
use crate::remote::RemoteProduct;
use crate::{Error, Result};

/// Thread-safe handle to the product store, the operation log and sync
/// bookkeeping, all kept in one libSQL database.
///
/// Every call holds the database for its whole duration, so multi-step
/// changes (promoting a temporary record, applying a merge) are never
/// observed half-done. After [`LocalStore::close`] every call fails with
/// [`Error::StorageUnavailable`].
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Option<Database>>>,
    db_path: Option<PathBuf>,
}

fn opened(db: &Option<Database>) -> Result<&Database> {
    db.as_ref()
        .ok_or_else(|| Error::StorageUnavailable("local store is closed".to_string()))
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::info!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(Some(db))),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Release the database. Clones of this handle are closed too.
    pub async fn close(&self) {
        if self.db.lock().await.take().is_some() {
            tracing::info!("Closed local store");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.db.lock().await.is_none()
    }

    // ----- products -----

    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlProductRepository::new(db.connection()).get(id).await
    }

    /// Insert or replace a record
    pub async fn put(&self, product: &Product) -> Result<()> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlProductRepository::new(db.connection())
            .put(product)
            .await
    }

    pub async fn delete(&self, id: &ProductId) -> Result<bool> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlProductRepository::new(db.connection())
            .delete(id)
            .await
    }

    /// All records, soft-deleted ones included
    pub async fn list(&self) -> Result<Vec<Product>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlProductRepository::new(db.connection()).list().await
    }

    /// Records to display (soft-deleted ones hidden)
    pub async fn list_visible(&self) -> Result<Vec<Product>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlProductRepository::new(db.connection())
            .list_visible()
            .await
    }

    /// Whether `id` is used by a record, a queued operation or a mapping
    pub async fn id_in_use(&self, id: &ProductId) -> Result<bool> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        let conn = db.connection();
        Ok(LibSqlProductRepository::new(conn).get(id).await?.is_some()
            || LibSqlOperationLog::new(conn).references(id).await?
            || LibSqlIdMappingRepository::new(conn).get(id).await?.is_some())
    }

    // ----- operation log -----

    pub async fn enqueue(&self, kind: &OperationKind) -> Result<Operation> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlOperationLog::new(db.connection()).enqueue(kind).await
    }

    /// Store a record and append the operation that replays it, atomically
    pub async fn write_and_enqueue(
        &self,
        product: &Product,
        kind: &OperationKind,
    ) -> Result<Operation> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        let conn = db.connection();

        db.begin().await?;
        let result: Result<Operation> = async {
            LibSqlProductRepository::new(conn).put(product).await?;
            LibSqlOperationLog::new(conn).enqueue(kind).await
        }
        .await;
        db.finish(result).await
    }

    /// Snapshot of the log in enqueue order
    pub async fn peek_operations(&self) -> Result<Vec<Operation>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlOperationLog::new(db.connection()).peek_all().await
    }

    pub async fn remove_operations(&self, seqs: &[i64]) -> Result<usize> {
        if seqs.is_empty() {
            return Ok(0);
        }
        let db = self.db.lock().await;
        let db = opened(&db)?;
        db.begin().await?;
        let result = LibSqlOperationLog::new(db.connection())
            .remove_all(seqs)
            .await;
        db.finish(result).await
    }

    pub async fn has_pending(&self) -> Result<bool> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        Ok(!LibSqlOperationLog::new(db.connection()).is_empty().await?)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlOperationLog::new(db.connection()).len().await
    }

    // ----- identifier mappings -----

    /// Replace a temporary record with its server-side twin.
    ///
    /// Inserts the record under `server.id` (local fields win when the
    /// temporary record still exists), records the mapping, then removes the
    /// temporary record, all in one transaction. The local sync status is
    /// carried over; `settle` decides when the record is synced.
    pub async fn promote_temporary(
        &self,
        temp_id: &ProductId,
        server: RemoteProduct,
    ) -> Result<Product> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        let conn = db.connection();
        let products = LibSqlProductRepository::new(conn);

        db.begin().await?;
        let result: Result<Product> = async {
            let promoted = match products.get(temp_id).await? {
                Some(local) => local.with_id(server.id.clone()),
                None => server.clone().into_product(),
            };
            products.put(&promoted).await?;
            LibSqlIdMappingRepository::new(conn)
                .record(temp_id, &server.id)
                .await?;
            products.delete(temp_id).await?;
            Ok(promoted)
        }
        .await;
        db.finish(result).await
    }

    /// Server id recorded for `temp_id`
    pub async fn mapped_id(&self, temp_id: &ProductId) -> Result<Option<ProductId>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlIdMappingRepository::new(db.connection())
            .get(temp_id)
            .await
    }

    /// Follow a stale temporary id to its server id; other ids pass through
    pub async fn resolve_id(&self, id: &ProductId) -> Result<ProductId> {
        if !id.is_temporary() {
            return Ok(id.clone());
        }
        Ok(self.mapped_id(id).await?.unwrap_or_else(|| id.clone()))
    }

    pub async fn id_mapping(&self) -> Result<IdMapping> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        Ok(LibSqlIdMappingRepository::new(db.connection())
            .list()
            .await?
            .into_iter()
            .collect())
    }

    // ----- failures -----

    pub async fn record_failure(&self, operation: &Operation, reason: &str) -> Result<SyncFailure> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlSyncFailureRepository::new(db.connection())
            .record(operation, reason)
            .await
    }

    pub async fn list_failures(&self) -> Result<Vec<SyncFailure>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlSyncFailureRepository::new(db.connection())
            .list()
            .await
    }

    pub async fn get_failure(&self, id: i64) -> Result<Option<SyncFailure>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlSyncFailureRepository::new(db.connection())
            .get(id)
            .await
    }

    pub async fn remove_failure(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlSyncFailureRepository::new(db.connection())
            .remove(id)
            .await
    }

    pub async fn failure_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlSyncFailureRepository::new(db.connection())
            .count()
            .await
    }

    /// Move a failure back into the log as a new entry
    pub async fn requeue_failure(&self, id: i64) -> Result<Operation> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        let conn = db.connection();
        let failures = LibSqlSyncFailureRepository::new(conn);
        let failure = failures
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync failure {id}")))?;

        db.begin().await?;
        let result: Result<Operation> = async {
            let operation = LibSqlOperationLog::new(conn).enqueue(&failure.kind).await?;
            failures.remove(id).await?;
            Ok(operation)
        }
        .await;
        db.finish(result).await
    }

    // ----- sync status -----

    /// Ids still referenced by the log or by a failure, stale temporary
    /// ids resolved to their server ids
    async fn referenced_ids(db: &Database) -> Result<HashSet<ProductId>> {
        let conn = db.connection();
        let mapping: IdMapping = LibSqlIdMappingRepository::new(conn)
            .list()
            .await?
            .into_iter()
            .collect();
        let operations = LibSqlOperationLog::new(conn).peek_all().await?;
        let failures = LibSqlSyncFailureRepository::new(conn).list().await?;

        let targets = operations
            .iter()
            .map(|operation| operation.kind.target_id())
            .chain(failures.iter().map(|failure| failure.kind.target_id()));
        let mut referenced = HashSet::new();
        for target in targets {
            referenced.insert(remap(target, &mapping));
            referenced.insert(target.clone());
        }
        Ok(referenced)
    }

    /// Mark records synced unless an operation or failure still refers to them
    pub async fn settle(&self, ids: &[ProductId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let db = self.db.lock().await;
        let db = opened(&db)?;
        let referenced = Self::referenced_ids(db).await?;
        let products = LibSqlProductRepository::new(db.connection());

        let mut settled = 0;
        for id in ids {
            if referenced.contains(id) {
                continue;
            }
            let Some(product) = products.get(id).await? else {
                continue;
            };
            if product.sync_status == SyncStatus::Pending && !product.is_deleted {
                products.set_sync_status(id, SyncStatus::Synced).await?;
                settled += 1;
            }
        }
        Ok(settled)
    }

    /// Fold a full remote listing into the store and stamp the sync time
    pub async fn apply_merge(&self, remote: Vec<RemoteProduct>, synced_at: i64) -> Result<MergePlan> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        let conn = db.connection();
        let products = LibSqlProductRepository::new(conn);

        let protected = Self::referenced_ids(db).await?;
        let local = products.list().await?;
        let plan = plan_merge(&local, remote, &protected);

        db.begin().await?;
        let result: Result<()> = async {
            for product in &plan.upserts {
                products.put(product).await?;
            }
            for id in &plan.removals {
                products.delete(id).await?;
            }
            LibSqlSyncMetaRepository::new(conn)
                .set_last_synced_at(synced_at)
                .await
        }
        .await;
        db.finish(result).await?;
        Ok(plan)
    }

    // ----- metadata -----

    /// Time of the last completed pull-and-merge (Unix ms)
    pub async fn last_synced_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        let db = opened(&db)?;
        LibSqlSyncMetaRepository::new(db.connection())
            .last_synced_at()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductDraft;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn temp_product(name: &str) -> Product {
        Product::from_draft(
            ProductId::temporary(),
            ProductDraft::new(name).with_price(9.99),
            SyncStatus::Pending,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_and_enqueue_is_atomic() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let product = temp_product("Widget");
        let create = OperationKind::Create {
            temp_id: product.id.clone(),
            payload: product.draft(),
        };

        store.write_and_enqueue(&product, &create).await.unwrap();
        // Second create for the same temp id fails and must not touch the record
        let mut renamed = product.clone();
        renamed.name = "Renamed".into();
        assert!(store.write_and_enqueue(&renamed, &create).await.is_err());

        assert_eq!(store.get(&product.id).await.unwrap(), Some(product));
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_promote_temporary_swaps_records_and_records_mapping() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let product = temp_product("Widget");
        store.put(&product).await.unwrap();

        let server = RemoteProduct::new(ProductId::new("abc123"), product.draft());
        let promoted = store.promote_temporary(&product.id, server).await.unwrap();

        assert_eq!(promoted.id.as_str(), "abc123");
        assert_eq!(promoted.sync_status, SyncStatus::Pending);
        assert!(store.get(&product.id).await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap(), vec![promoted.clone()]);

        assert_eq!(store.settle(&[promoted.id.clone()]).await.unwrap(), 1);
        assert_eq!(
            store.get(&promoted.id).await.unwrap().unwrap().sync_status,
            SyncStatus::Synced
        );
        assert_eq!(
            store.resolve_id(&product.id).await.unwrap(),
            ProductId::new("abc123")
        );
        assert!(store.id_in_use(&product.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_settle_keeps_referenced_records_pending() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let mut queued = temp_product("Queued");
        queued.id = ProductId::new("queued");
        let mut done = temp_product("Done");
        done.id = ProductId::new("done");
        store.put(&done).await.unwrap();
        store
            .write_and_enqueue(
                &queued,
                &OperationKind::Update {
                    id: queued.id.clone(),
                    payload: queued.draft(),
                },
            )
            .await
            .unwrap();

        let settled = store
            .settle(&[queued.id.clone(), done.id.clone()])
            .await
            .unwrap();
        assert_eq!(settled, 1);
        assert_eq!(
            store.get(&queued.id).await.unwrap().unwrap().sync_status,
            SyncStatus::Pending
        );
        assert_eq!(
            store.get(&done.id).await.unwrap().unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_requeue_failure_appends_new_operation() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let operation = store
            .enqueue(&OperationKind::Delete {
                id: ProductId::new("abc123"),
            })
            .await
            .unwrap();
        store.remove_operations(&[operation.seq]).await.unwrap();
        let failure = store.record_failure(&operation, "forbidden").await.unwrap();

        let requeued = store.requeue_failure(failure.id).await.unwrap();
        assert_eq!(requeued.kind, operation.kind);
        assert!(requeued.seq > operation.seq);
        assert_eq!(store.failure_count().await.unwrap(), 0);
        assert!(matches!(
            store.requeue_failure(failure.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_closed_store_reports_storage_unavailable() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let handle = store.clone();
        store.close().await;

        assert!(handle.is_closed().await);
        assert!(matches!(
            handle.list().await,
            Err(Error::StorageUnavailable(_))
        ));
        assert!(matches!(
            handle.pending_count().await,
            Err(Error::StorageUnavailable(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_log_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("stockroom.db");
        let product = temp_product("Widget");

        {
            let store = LocalStore::open_path(&path).await.unwrap();
            store
                .write_and_enqueue(
                    &product,
                    &OperationKind::Create {
                        temp_id: product.id.clone(),
                        payload: product.draft(),
                    },
                )
                .await
                .unwrap();
            store.close().await;
        }

        let store = LocalStore::open_path(&path).await.unwrap();
        assert_eq!(store.get(&product.id).await.unwrap(), Some(product));
        assert_eq!(store.peek_operations().await.unwrap().len(), 1);
    }
}
