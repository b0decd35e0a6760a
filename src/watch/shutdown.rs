//! Shutdown coordination for the watcher's background loops.

use tokio::sync::broadcast;

/// Coordinator for stopping the watch and poll loops.
///
/// Provides a broadcast channel that every long-running task subscribes to.
/// Producers stop writing to the reload channel before the dispatch loop
/// joins them, so nothing races a closing receiver.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Idempotent; triggering with no
    /// listeners is harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
