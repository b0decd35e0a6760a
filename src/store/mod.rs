//! Backend store contracts.
//!
//! # Data Flow
//! ```text
//! KeyStore::get(path)        → raw config document (point-in-time read)
//! KeyStore::watch(path)      → resolves when the document next changes
//! SecretStore::get(key)      → current secret value (no native watch;
//!                              drift is found by the poller re-reading)
//! ```
//!
//! # Design Decisions
//! - The engine never opens a connection itself; transports live behind
//!   these narrow traits and are injected at construction
//! - `watch` is long-poll shaped: each call waits for the next change after
//!   the moment it was issued, so the caller re-invokes it in a loop
//! - Both traits are object-safe so stores are carried as `Arc<dyn _>`

pub mod memory;
pub mod settings;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::{MemoryKeyStore, MemorySecretStore};
pub use settings::{KeyStoreSettings, SecretAuth, SecretStoreSettings, TlsSettings};

/// The primary key/value store holding the configuration document.
///
/// Implementations must be safe for concurrent use: one task blocks in
/// [`watch`](KeyStore::watch) while another calls [`get`](KeyStore::get)
/// during a reload.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Point-in-time read of a key. Must reflect a quorum-consistent view.
    ///
    /// Returns [`StoreError::UnexpectedDir`] when the key names a namespace
    /// rather than a leaf value.
    async fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Block until the key's value changes after this call was issued.
    ///
    /// Returns `Ok(())` on a change and [`StoreError::Closed`] once the
    /// client is closed. Past changes already signaled to a previous caller
    /// are not replayed.
    async fn watch(&self, key: &str) -> Result<(), StoreError>;

    /// Terminate any in-flight watch promptly.
    async fn close(&self);
}

/// The secondary store holding individually addressed secret values.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the current value of a secret key.
    ///
    /// Returns [`StoreError::NotFound`] when absent and
    /// [`StoreError::NotText`] when the remote value is not representable
    /// as a single string; both are non-retryable, unlike
    /// [`StoreError::Transport`].
    async fn get(&self, key: &str) -> Result<String, StoreError>;
}
