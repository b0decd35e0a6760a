//! Poll-based secret drift detection.
//!
//! # Responsibilities
//! - Re-read every tracked secret key on a fixed interval
//! - Emit one reload signal when any value differs from the cached one
//!
//! # Design Decisions
//! - The first mismatch ends the sweep: the reload re-scans everything
//!   anyway, superseding whatever the rest of the sweep would find
//! - A per-key read error is reported and retried next tick, never fatal
//! - Shutdown wins between ticks; an in-flight read completes first

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::error::WatchError;
use crate::secrets::SecretCache;
use crate::store::SecretStore;

/// Periodically sweeps the [`SecretCache`] against the live store.
pub struct SecretPoller {
    store: Arc<dyn SecretStore>,
    cache: SecretCache,
    interval: Duration,
}

impl SecretPoller {
    pub fn new(store: Arc<dyn SecretStore>, cache: SecretCache, interval: Duration) -> Self {
        Self {
            store,
            cache,
            interval,
        }
    }

    /// Run until shutdown. Sends at most one signal per sweep; a full
    /// channel simply coalesces the signal into the pending reload.
    pub async fn run<F>(
        self,
        reload_tx: mpsc::Sender<()>,
        on_error: F,
        mut shutdown: broadcast::Receiver<()>,
    ) where
        F: Fn(WatchError) + Send + Sync,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately;
        // consume it so sweeps start one full interval in.
        ticker.tick().await;

        tracing::debug!(interval = ?self.interval, "secret poller starting");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.sweep(&reload_tx, &on_error).await {
                        tracing::info!("secret drift detected, reload signaled");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("secret poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One pass over the tracked keys. Returns whether drift was signaled.
    async fn sweep<F>(&self, reload_tx: &mpsc::Sender<()>, on_error: &F) -> bool
    where
        F: Fn(WatchError) + Send + Sync,
    {
        for (key, last_seen) in self.cache.entries() {
            match self.store.get(&key).await {
                Ok(current) if current != last_seen => {
                    let _ = reload_tx.try_send(());
                    return true;
                }
                Ok(_) => {}
                Err(source) => {
                    on_error(WatchError::Secret { key, source });
                }
            }
        }
        false
    }
}
