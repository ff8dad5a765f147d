//! Background sync triggers

use std::future::Future;
use std::sync::Arc;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::engine::{CycleOutcome, SyncEngine};
use crate::remote::RemoteCatalog;

/// Runs sync cycles on startup, on reconnect and on an optional interval.
///
/// Triggers that arrive while a cycle runs are dropped by the engine.
pub struct SyncScheduler<R> {
    engine: Arc<SyncEngine<R>>,
}

impl<R: RemoteCatalog> SyncScheduler<R> {
    pub const fn new(engine: Arc<SyncEngine<R>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<SyncEngine<R>> {
        &self.engine
    }

    /// Drive triggers until `shutdown` resolves or connectivity is dropped
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut watcher = self.engine.connectivity().subscribe();
        let period = self.engine.config().sync_interval;
        let mut ticker = period.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        self.run_cycle("startup").await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Sync scheduler stopping");
                    break;
                }
                reconnected = watcher.became_online() => {
                    if !reconnected {
                        tracing::debug!("Connectivity signal dropped; scheduler stopping");
                        break;
                    }
                    self.run_cycle("reconnect").await;
                }
                () = tick(ticker.as_mut()) => {
                    self.run_cycle("interval").await;
                }
            }
        }
    }

    async fn run_cycle(&self, reason: &str) {
        match self.engine.sync_now().await {
            Ok(CycleOutcome::Completed(report)) => {
                tracing::debug!("Sync ({reason}) done: {} applied", report.applied);
            }
            Ok(CycleOutcome::AlreadyRunning) => {
                tracing::debug!("Sync ({reason}) skipped: cycle in progress");
            }
            Ok(CycleOutcome::Offline) => {
                tracing::debug!("Sync ({reason}) skipped: offline");
            }
            Err(error) if error.is_transient() => {
                tracing::warn!("Sync ({reason}) failed: {error}");
            }
            Err(error) => {
                tracing::error!("Sync ({reason}) failed: {error}");
            }
        }
    }
}

async fn tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
