//! Connectivity signal.
//!
//! The engine does not detect connectivity itself. Front ends feed a
//! [`ConnectivitySignal`] from whatever they can observe (OS hooks, a
//! reachability probe, a `--offline` flag) and the engine reads the current
//! state before each remote call. Schedulers subscribe to the
//! offline-to-online edge to start a sync cycle.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared online/offline flag
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the state; returns true when it actually changed
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == online {
                false
            } else {
                *state = online;
                true
            }
        });
        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::warn!("Connectivity lost");
            }
        }
        changed
    }

    pub fn subscribe(&self) -> ConnectivityWatcher {
        let rx = self.tx.subscribe();
        let last_seen = *rx.borrow();
        ConnectivityWatcher { rx, last_seen }
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::online()
    }
}

/// Receiver side of a [`ConnectivitySignal`]
#[derive(Debug)]
pub struct ConnectivityWatcher {
    rx: watch::Receiver<bool>,
    last_seen: bool,
}

impl ConnectivityWatcher {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next offline-to-online transition.
    ///
    /// Returns `false` once every [`ConnectivitySignal`] handle is dropped.
    /// Cancel-safe, so it can sit in a `tokio::select!` loop.
    pub async fn became_online(&mut self) -> bool {
        loop {
            if self.rx.changed().await.is_err() {
                return false;
            }
            let online = *self.rx.borrow_and_update();
            let edge = online && !self.last_seen;
            self.last_seen = online;
            if edge {
                return true;
            }
        }
    }
}
