//! Sync engine: replays the operation log and merges server state.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use super::report::{MergeSummary, RejectedOperation, SyncReport};
use crate::config::EngineConfig;
use crate::connectivity::ConnectivitySignal;
use crate::models::{Operation, OperationKind, ProductId};
use crate::reconcile::{remap, IdMapping};
use crate::remote::{RemoteCatalog, RemoteError};
use crate::services::LocalStore;
use crate::util::unix_millis_now;
use crate::{Error, Result};

/// Phase of the sync state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    /// Replaying queued operations
    Syncing,
    /// Pulling and merging authoritative state
    Merging,
}

impl SyncPhase {
    /// Returns true while a cycle is running.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Syncing | Self::Merging)
    }

    /// Returns true if a new cycle may start.
    pub const fn can_start_sync(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Merging => "merging",
        })
    }
}

/// What a sync trigger did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(SyncReport),
    /// Another cycle was running; nothing was started
    AlreadyRunning,
    /// Connectivity is down; nothing was started
    Offline,
}

/// Where a user-facing write ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum Delivery {
    /// Acknowledged by the remote catalog
    Synced,
    /// Stored locally, waiting in the operation log
    Queued,
    /// Rejected by the remote catalog and kept as a sync failure
    Rejected(String),
}

/// Snapshot of what the engine is doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub phase: SyncPhase,
    pub online: bool,
    /// Queued operations ("pending sync" indicator)
    pub pending_operations: usize,
    /// Rejected operations awaiting a user decision
    pub failures: usize,
    /// Last completed pull-and-merge (Unix ms)
    pub last_synced_at: Option<i64>,
}

impl EngineStatus {
    pub const fn pending_sync(&self) -> bool {
        self.pending_operations > 0
    }
}

/// Resets the phase to idle however the cycle ends
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<SyncPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a watch::Sender<SyncPhase>, initial: SyncPhase) -> Self {
        phase.send_replace(initial);
        Self { phase }
    }

    fn set(&self, next: SyncPhase) {
        self.phase.send_replace(next);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(SyncPhase::Idle);
    }
}

/// Drives sync cycles between the local store and a remote catalog.
///
/// At most one cycle runs at a time; a trigger that arrives while a cycle is
/// running is dropped, not queued. Writes made during a cycle land in the
/// store and the log immediately but wait for the next cycle.
pub struct SyncEngine<R> {
    store: LocalStore,
    remote: R,
    connectivity: ConnectivitySignal,
    config: EngineConfig,
    lane: Mutex<()>,
    phase: watch::Sender<SyncPhase>,
}

impl<R: RemoteCatalog> SyncEngine<R> {
    pub fn new(
        store: LocalStore,
        remote: R,
        connectivity: ConnectivitySignal,
        config: EngineConfig,
    ) -> Self {
        let (phase, _rx) = watch::channel(SyncPhase::Idle);
        Self {
            store,
            remote,
            connectivity,
            config,
            lane: Mutex::new(()),
            phase,
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn connectivity(&self) -> &ConnectivitySignal {
        &self.connectivity
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Follow phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            phase: self.phase(),
            online: self.connectivity.is_online(),
            pending_operations: self.store.pending_count().await?,
            failures: self.store.failure_count().await?,
            last_synced_at: self.store.last_synced_at().await?,
        })
    }

    /// Run one full cycle: replay the log, then pull and merge.
    ///
    /// The merge runs only when the replay left the log empty.
    pub async fn sync_now(&self) -> Result<CycleOutcome> {
        if !self.connectivity.is_online() {
            tracing::debug!("Sync skipped: offline");
            return Ok(CycleOutcome::Offline);
        }
        let Ok(_lane) = self.lane.try_lock() else {
            tracing::debug!("Sync skipped: a cycle is already running");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let started = Instant::now();
        let phase = PhaseGuard::enter(&self.phase, SyncPhase::Syncing);
        let snapshot = self.store.peek_operations().await?;
        tracing::info!("Sync cycle started ({} queued operations)", snapshot.len());

        let mut report = SyncReport::default();
        self.replay(snapshot, &mut report).await?;

        if report.interrupted || !self.connectivity.is_online() {
            report.interrupted = true;
            tracing::warn!("Sync cycle interrupted by connectivity loss");
        } else if self.store.has_pending().await? {
            tracing::debug!("Merge skipped: operations remain queued");
        } else {
            phase.set(SyncPhase::Merging);
            report.merge = Some(self.pull_and_merge().await?);
        }

        report.duration = started.elapsed();
        tracing::info!(
            "Sync cycle finished: {} applied, {} deferred, {} rejected in {:?}",
            report.applied,
            report.deferred,
            report.rejected.len(),
            report.duration
        );
        Ok(CycleOutcome::Completed(report))
    }

    /// Try to deliver a freshly queued write right away.
    ///
    /// Only replays when online, idle, and `operation` is the whole log;
    /// otherwise the write waits for the next cycle so order is preserved.
    pub async fn submit(&self, operation: &Operation) -> Result<Delivery> {
        if !self.connectivity.is_online() {
            return Ok(Delivery::Queued);
        }
        let Ok(_lane) = self.lane.try_lock() else {
            return Ok(Delivery::Queued);
        };

        let queued = self.store.peek_operations().await?;
        if queued.len() != 1 || queued[0].seq != operation.seq {
            return Ok(Delivery::Queued);
        }

        let _phase = PhaseGuard::enter(&self.phase, SyncPhase::Syncing);
        let mut report = SyncReport::default();
        match self.replay(queued, &mut report).await {
            Ok(()) => {}
            Err(Error::Unauthorized(message)) => {
                tracing::warn!("Write queued: {message}");
                return Ok(Delivery::Queued);
            }
            Err(error) => return Err(error),
        }

        Ok(if report.applied > 0 {
            Delivery::Synced
        } else if let Some(rejected) = report.rejected.into_iter().next() {
            Delivery::Rejected(rejected.reason)
        } else {
            Delivery::Queued
        })
    }

    /// Replay `operations` in order and settle the log.
    ///
    /// Transient failures leave the operation (and every later one on the
    /// same product) queued. Permanent failures move the operation to the
    /// failure list. An authentication failure stops the replay.
    async fn replay(&self, operations: Vec<Operation>, report: &mut SyncReport) -> Result<()> {
        let mut mapping = self.store.id_mapping().await?;
        let mut deferred_targets: HashSet<ProductId> = HashSet::new();
        let mut completed = Vec::new();
        let mut touched = Vec::new();
        let mut outcome = Ok(());

        for operation in operations {
            if !self.connectivity.is_online() {
                report.interrupted = true;
                break;
            }

            let original = operation.target_id().clone();
            let target = remap(&original, &mapping);
            if deferred_targets.contains(&target) || deferred_targets.contains(&original) {
                report.deferred += 1;
                continue;
            }

            tracing::debug!("Replaying #{} {} {target}", operation.seq, operation.action());
            match self.apply(&operation, &target, &mut mapping, report).await {
                Ok(settled_id) => {
                    report.applied += 1;
                    completed.push(operation.seq);
                    touched.push(settled_id);
                }
                Err(Error::Transient(message)) => {
                    tracing::warn!("Deferred #{} for {target}: {message}", operation.seq);
                    report.deferred += 1;
                    deferred_targets.insert(original);
                    deferred_targets.insert(target);
                }
                Err(Error::Permanent(message)) => {
                    tracing::warn!("Rejected #{} for {target}: {message}", operation.seq);
                    self.store.record_failure(&operation, &message).await?;
                    completed.push(operation.seq);
                    report.rejected.push(RejectedOperation {
                        seq: operation.seq,
                        action: operation.action(),
                        target_id: target,
                        reason: message,
                    });
                }
                Err(error) => {
                    tracing::warn!("Replay stopped at #{}: {error}", operation.seq);
                    outcome = Err(error);
                    break;
                }
            }
        }

        self.store.remove_operations(&completed).await?;
        self.store.settle(&touched).await?;
        outcome
    }

    /// Send one operation; returns the id of the record it settled
    async fn apply(
        &self,
        operation: &Operation,
        target: &ProductId,
        mapping: &mut IdMapping,
        report: &mut SyncReport,
    ) -> Result<ProductId> {
        let collection = self.config.collection.as_str();
        match &operation.kind {
            OperationKind::Create { temp_id, payload } => {
                if let Some(server_id) = mapping.get(temp_id) {
                    // Acknowledged before a crash; the entry outlived the promotion
                    tracing::info!("Create for {temp_id} already acknowledged as {server_id}");
                    return Ok(server_id.clone());
                }
                let created = self.call(self.remote.create(collection, payload)).await?;
                let server_id = created.id.clone();
                self.store.promote_temporary(temp_id, created).await?;
                tracing::info!("Remapped {temp_id} -> {server_id}");
                mapping.insert(temp_id.clone(), server_id.clone());
                report.remapped.push((temp_id.clone(), server_id.clone()));
                Ok(server_id)
            }
            OperationKind::Update { payload, .. } => {
                if target.is_temporary() {
                    return Err(Error::Permanent(format!(
                        "product {target} was never created remotely"
                    )));
                }
                self.call(self.remote.update(collection, target, payload))
                    .await?;
                Ok(target.clone())
            }
            OperationKind::Delete { .. } => {
                if !target.is_temporary() {
                    self.call(self.remote.delete(collection, target)).await?;
                }
                self.store.delete(target).await?;
                Ok(target.clone())
            }
        }
    }

    async fn pull_and_merge(&self) -> Result<MergeSummary> {
        let remote = self
            .call(self.remote.list(self.config.collection.as_str()))
            .await?;
        let plan = self.store.apply_merge(remote, unix_millis_now()).await?;
        let summary = MergeSummary::from(&plan);
        tracing::info!(
            "Merged remote catalog: {} refreshed, {} kept local, {} removed",
            summary.refreshed,
            summary.kept_local,
            summary.removed
        );
        Ok(summary)
    }

    /// Bound a remote call by the configured timeout
    async fn call<T>(
        &self,
        request: impl Future<Output = std::result::Result<T, RemoteError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Transient(format!(
                "remote call timed out after {:?}",
                self.config.request_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Product, ProductDraft, SyncStatus};
    use crate::remote::{CallKind, MemoryRemoteCatalog, RemoteProduct};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn engine(online: bool) -> SyncEngine<MemoryRemoteCatalog> {
        SyncEngine::new(
            LocalStore::open_in_memory().await.unwrap(),
            MemoryRemoteCatalog::new(),
            ConnectivitySignal::new(online),
            EngineConfig::default().with_request_timeout(Duration::from_millis(200)),
        )
    }

    async fn queue_create(engine: &SyncEngine<MemoryRemoteCatalog>, name: &str) -> Product {
        let product = Product::from_draft(
            ProductId::temporary(),
            ProductDraft::new(name),
            SyncStatus::Pending,
        );
        engine
            .store()
            .write_and_enqueue(
                &product,
                &OperationKind::Create {
                    temp_id: product.id.clone(),
                    payload: product.draft(),
                },
            )
            .await
            .unwrap();
        product
    }

    fn completed(outcome: CycleOutcome) -> SyncReport {
        match outcome {
            CycleOutcome::Completed(report) => report,
            other => panic!("expected a completed cycle, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_trigger_does_nothing() {
        let engine = engine(false).await;
        queue_create(&engine, "Widget").await;

        assert_eq!(engine.sync_now().await.unwrap(), CycleOutcome::Offline);
        assert!(engine.remote().calls().is_empty());
        assert_eq!(engine.store().pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cycle_replays_then_merges() {
        let engine = engine(true).await;
        engine.remote().upsert(RemoteProduct::new(
            ProductId::new("other"),
            ProductDraft::new("From another client"),
        ));
        let product = queue_create(&engine, "Widget").await;

        let report = completed(engine.sync_now().await.unwrap());

        assert_eq!(report.applied, 1);
        assert_eq!(report.remapped.len(), 1);
        assert_eq!(report.remapped[0].0, product.id);
        assert_eq!(
            report.merge,
            Some(MergeSummary {
                refreshed: 1,
                kept_local: 0,
                removed: 0,
                unchanged: 1,
            })
        );
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(engine.status().await.unwrap().last_synced_at.is_some());
        assert_eq!(engine.store().list().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn phase_changes_are_published_during_cycle() {
        let engine = engine(true).await;
        engine
            .remote()
            .set_latency(Some(Duration::from_millis(50)));
        queue_create(&engine, "Widget").await;

        let mut phases = engine.subscribe_phase();
        assert_eq!(*phases.borrow(), SyncPhase::Idle);
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while phases.changed().await.is_ok() {
                let phase = *phases.borrow_and_update();
                seen.push(phase);
                if phase == SyncPhase::Idle {
                    break;
                }
            }
            seen
        });

        completed(engine.sync_now().await.unwrap());
        let seen = tokio::time::timeout(Duration::from_secs(1), observer)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            seen,
            vec![SyncPhase::Syncing, SyncPhase::Merging, SyncPhase::Idle]
        );
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_failure_defers_later_operations_on_same_target() {
        let engine = engine(true).await;
        let product = queue_create(&engine, "Widget").await;
        engine
            .store()
            .enqueue(&OperationKind::Update {
                id: product.id.clone(),
                payload: ProductDraft::new("Widget v2"),
            })
            .await
            .unwrap();
        engine
            .remote()
            .fail_next(CallKind::Create, RemoteError::transient("connection reset"));

        let report = completed(engine.sync_now().await.unwrap());

        assert_eq!(report.applied, 0);
        assert_eq!(report.deferred, 2);
        assert_eq!(report.merge, None);
        assert_eq!(engine.store().pending_count().await.unwrap(), 2);
        assert_eq!(engine.remote().calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_remote_counts_as_transient() {
        let engine = engine(true).await;
        queue_create(&engine, "Widget").await;
        engine
            .remote()
            .set_latency(Some(Duration::from_millis(500)));

        let report = completed(engine.sync_now().await.unwrap());
        assert_eq!(report.deferred, 1);
        assert_eq!(engine.store().pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_stops_replay_and_keeps_queue() {
        let engine = engine(true).await;
        queue_create(&engine, "Widget").await;
        queue_create(&engine, "Gadget").await;
        engine.remote().fail_next(
            CallKind::Create,
            RemoteError::Unauthorized("token expired".into()),
        );

        let result = engine.sync_now().await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.store().pending_count().await.unwrap(), 2);
        assert_eq!(engine.remote().calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_delivers_single_queued_write() {
        let engine = engine(true).await;
        let product = queue_create(&engine, "Widget").await;
        let operation = engine.store().peek_operations().await.unwrap().remove(0);

        assert_eq!(engine.submit(&operation).await.unwrap(), Delivery::Synced);
        assert!(engine.store().get(&product.id).await.unwrap().is_none());
        assert!(!engine.store().has_pending().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_waits_behind_older_operations() {
        let engine = engine(true).await;
        queue_create(&engine, "Widget").await;
        queue_create(&engine, "Gadget").await;
        let newest = engine.store().peek_operations().await.unwrap().remove(1);

        assert_eq!(engine.submit(&newest).await.unwrap(), Delivery::Queued);
        assert!(engine.remote().calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_reports_rejection() {
        let engine = engine(true).await;
        queue_create(&engine, "Widget").await;
        let operation = engine.store().peek_operations().await.unwrap().remove(0);
        engine.remote().fail_next(
            CallKind::Create,
            RemoteError::permanent(Some(400), "nombre is required"),
        );

        let delivery = engine.submit(&operation).await.unwrap();
        assert!(matches!(delivery, Delivery::Rejected(reason) if reason.contains("nombre")));
        assert_eq!(engine.store().failure_count().await.unwrap(), 1);
    }

    #[test]
    fn phase_helpers() {
        assert!(SyncPhase::Idle.can_start_sync());
        assert!(!SyncPhase::Syncing.can_start_sync());
        assert!(SyncPhase::Merging.is_active());
        assert_eq!(SyncPhase::Merging.to_string(), "merging");
    }
}
