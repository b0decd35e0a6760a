//! The watch coordinator.
//!
//! # Data Flow
//! ```text
//! primary store watch loop ──┐
//! secret drift poller ───────┼──▶ reload channel (bounded, coalescing)
//! explicit trigger() ────────┘         │
//!                                      ▼
//!                             dispatch loop (the task that called watch)
//!                                fetch → decode → scan → deserialize
//!                                rotate old/new snapshot pair
//!                                run hooks in registration order
//! ```
//!
//! # Design Decisions
//! - One signal is processed fully, hooks included, before the next is
//!   drained; two reloads are never dispatched concurrently
//! - A failed reload reports to the error sink and keeps the previous
//!   snapshot published; the watcher keeps running
//! - The published pair lives in an `ArcSwap`, so snapshot readers never
//!   observe a half-swapped pair and never block the dispatch loop

pub mod shutdown;

pub use shutdown::Shutdown;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc};

use crate::decode::{self, DecodeFn};
use crate::error::{SettingsError, WatchError};
use crate::secrets::{SecretCache, SecretPoller, SecretScanner, SecretSpec};
use crate::store::settings::DEFAULT_POLL_INTERVAL;
use crate::store::{KeyStore, SecretStore};

/// Capacity of the reload channel. A burst of signals beyond this is
/// dropped: a reload re-fetches the latest state, so duplicates carry no
/// information.
const RELOAD_CHANNEL_CAPACITY: usize = 10;

/// Fixed backoff between failed primary watch calls.
const WATCH_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Result type for reload hooks.
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Hook<T> = Arc<dyn Fn(&T, &T) -> HookResult + Send + Sync>;

/// Replaceable error sink shared by the background loops.
#[derive(Clone)]
pub(crate) struct SinkHandle {
    inner: Arc<RwLock<Arc<dyn Fn(WatchError) + Send + Sync>>>,
}

impl SinkHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(|err: WatchError| {
                tracing::error!(error = %err, "confsync watcher error");
            }))),
        }
    }

    fn set(&self, sink: Arc<dyn Fn(WatchError) + Send + Sync>) {
        *self.inner.write().unwrap() = sink;
    }

    pub(crate) fn report(&self, err: WatchError) {
        let sink = self.inner.read().unwrap().clone();
        sink(err);
    }
}

/// Options for a [`StoreWatcher`].
#[derive(Clone)]
pub struct WatchOptions {
    path: String,
    poll_interval: Duration,
    decode: DecodeFn,
    secrets: SecretSpec,
}

impl WatchOptions {
    /// Options for watching the document at `path` in the primary store,
    /// with JSON decoding and the default five-minute drift poll.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            decode: decode::json(),
            secrets: SecretSpec::new(),
        }
    }

    /// Override the secret drift polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Supply a decoder for a non-JSON document format. Anything that can
    /// produce a `serde_json::Value` tree works.
    pub fn decode_with<F>(mut self, decode: F) -> Self
    where
        F: Fn(&str) -> Result<serde_json::Value, WatchError> + Send + Sync + 'static,
    {
        self.decode = Arc::new(decode);
        self
    }

    /// Declare schema-level secret fields to resolve on every load.
    pub fn secrets(mut self, spec: SecretSpec) -> Self {
        self.secrets = spec;
        self
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.path.is_empty() {
            return Err(SettingsError::MissingPath);
        }
        Ok(())
    }
}

/// The published old/new snapshot pair. Rotated as a unit on each reload.
struct SnapshotPair<T> {
    old: Arc<T>,
    current: Arc<T>,
}

/// Keeps a typed configuration snapshot synchronized with the stores.
///
/// Construction performs the initial load and is fatal on any failure.
/// [`watch`](StoreWatcher::watch) then blocks its caller, driving reloads
/// until [`close`](StoreWatcher::close).
pub struct StoreWatcher<T> {
    key_store: Arc<dyn KeyStore>,
    secret_store: Arc<dyn SecretStore>,
    path: String,
    decode: DecodeFn,
    scanner: SecretScanner,
    cache: SecretCache,
    poll_interval: Duration,
    snapshots: ArcSwap<SnapshotPair<T>>,
    hooks: Mutex<Vec<Hook<T>>>,
    errors: SinkHandle,
    reload_tx: mpsc::Sender<()>,
    reload_rx: Mutex<Option<mpsc::Receiver<()>>>,
    shutdown: Shutdown,
    closed: AtomicBool,
}

impl<T> StoreWatcher<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Build a watcher and perform the initial load.
    pub async fn new(
        key_store: Arc<dyn KeyStore>,
        secret_store: Arc<dyn SecretStore>,
        options: WatchOptions,
    ) -> Result<Self, WatchError> {
        options.validate()?;

        let cache = SecretCache::new();
        let scanner = SecretScanner::new(
            secret_store.clone(),
            cache.clone(),
            options.secrets.clone(),
        );
        let initial = Arc::new(
            Self::load(&key_store, &options.path, &options.decode, &scanner).await?,
        );
        let (reload_tx, reload_rx) = mpsc::channel(RELOAD_CHANNEL_CAPACITY);

        Ok(Self {
            key_store,
            secret_store,
            path: options.path,
            decode: options.decode,
            scanner,
            cache,
            poll_interval: options.poll_interval,
            snapshots: ArcSwap::from_pointee(SnapshotPair {
                old: initial.clone(),
                current: initial,
            }),
            hooks: Mutex::new(Vec::new()),
            errors: SinkHandle::new(),
            reload_tx,
            reload_rx: Mutex::new(Some(reload_rx)),
            shutdown: Shutdown::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// The last successfully loaded snapshot. Never a partially-updated
    /// or error-state value.
    pub fn config(&self) -> Arc<T> {
        self.snapshots.load().current.clone()
    }

    /// Register a reload hook. Hooks run strictly in registration order on
    /// every successful reload, with the previous and current snapshots.
    /// A hook error is reported to the sink; later hooks still run.
    pub fn add_hook<F>(&self, hook: F)
    where
        F: Fn(&T, &T) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.lock().unwrap().push(Arc::new(hook));
    }

    /// Replace the error sink. The default logs through `tracing`.
    pub fn on_error<F>(&self, sink: F)
    where
        F: Fn(WatchError) + Send + Sync + 'static,
    {
        self.errors.set(Arc::new(sink));
    }

    /// Ask for a reload without a store change. Coalesced like any other
    /// signal.
    pub fn trigger(&self) {
        let _ = self.reload_tx.try_send(());
    }

    /// Start watching. Spawns the primary watch loop and the secret
    /// poller, then drains reload signals on the calling task until
    /// [`close`](StoreWatcher::close). Both producers are joined before
    /// this returns.
    pub async fn watch(&self) -> Result<(), WatchError> {
        let mut reload_rx = self
            .reload_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(WatchError::AlreadyWatching)?;

        let mut dispatch_shutdown = self.shutdown.subscribe();
        let watch_task = tokio::spawn(run_key_watch(
            self.key_store.clone(),
            self.path.clone(),
            self.reload_tx.clone(),
            self.errors.clone(),
            self.shutdown.subscribe(),
        ));
        let poller = SecretPoller::new(
            self.secret_store.clone(),
            self.cache.clone(),
            self.poll_interval,
        );
        let poll_errors = self.errors.clone();
        let poll_task = tokio::spawn(poller.run(
            self.reload_tx.clone(),
            move |err| poll_errors.report(err),
            self.shutdown.subscribe(),
        ));

        // A close that landed before the subscriptions above would be
        // missed by the broadcast; re-check and fall through to the join.
        if self.closed.load(Ordering::SeqCst) {
            self.shutdown.trigger();
        }

        loop {
            tokio::select! {
                _ = dispatch_shutdown.recv() => break,
                signal = reload_rx.recv() => match signal {
                    Some(()) => self.reload().await,
                    None => break,
                },
            }
        }

        let _ = tokio::join!(watch_task, poll_task);
        tracing::info!(path = %self.path, "watcher stopped");
        Ok(())
    }

    /// Stop watching. Interrupts the blocking primary watch, stops the
    /// poller before its next tick, and unblocks [`watch`](Self::watch).
    /// Safe to call more than once; later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.trigger();
        self.key_store.close().await;
    }

    /// One reload pass: build a fresh snapshot, rotate, run hooks.
    async fn reload(&self) {
        let fresh =
            match Self::load(&self.key_store, &self.path, &self.decode, &self.scanner).await {
                Ok(config) => Arc::new(config),
                Err(err) => {
                    // Previous snapshot stays published; no hooks run.
                    self.errors.report(err);
                    return;
                }
            };

        let previous = self.snapshots.load_full();
        let pair = Arc::new(SnapshotPair {
            old: previous.current.clone(),
            current: fresh,
        });
        self.snapshots.store(pair.clone());
        tracing::info!(path = %self.path, "configuration reloaded");

        let hooks: Vec<Hook<T>> = self.hooks.lock().unwrap().clone();
        for (index, hook) in hooks.iter().enumerate() {
            if let Err(source) = hook(&pair.old, &pair.current) {
                self.errors.report(WatchError::Hook { index, source });
            }
        }
    }

    /// Fetch, decode, resolve secrets, deserialize. Always builds a new
    /// value; the published snapshot is never mutated in place.
    async fn load(
        key_store: &Arc<dyn KeyStore>,
        path: &str,
        decode: &DecodeFn,
        scanner: &SecretScanner,
    ) -> Result<T, WatchError> {
        let raw = key_store.get(path).await?;
        let mut tree = decode(&raw)?;
        scanner.resolve(&mut tree).await?;
        serde_json::from_value(tree).map_err(|err| WatchError::Decode(err.to_string()))
    }
}

/// The primary store watch loop: long-poll, signal, repeat.
///
/// Transport errors and directory misclassifications are reported and
/// retried after a fixed backoff; only closure ends the loop.
async fn run_key_watch(
    store: Arc<dyn KeyStore>,
    path: String,
    reload_tx: mpsc::Sender<()>,
    errors: SinkHandle,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            result = store.watch(&path) => match result {
                Ok(()) => {
                    let _ = reload_tx.try_send(());
                }
                Err(err) if err.is_retryable() => {
                    errors.report(WatchError::Store(err));
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(WATCH_RETRY_BACKOFF) => {}
                    }
                }
                Err(_) => break,
            },
        }
    }
    tracing::debug!(path = %path, "primary watch loop exited");
}
