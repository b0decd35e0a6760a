//! confsync keeps a typed configuration struct synchronized with remote
//! backing stores.
//!
//! A [`StoreWatcher`] loads a configuration document from a primary
//! key/value store, resolves `VAULT(secret/...)` references through a
//! secret store, publishes immutable snapshots, and re-runs the whole
//! pipeline whenever either store changes, pushing (old, new) pairs
//! through ordered reload hooks.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use confsync::{MemoryKeyStore, MemorySecretStore, StoreWatcher, WatchOptions};
//!
//! #[derive(Deserialize)]
//! struct AppConfig {
//!     username: String,
//!     password: String,
//! }
//!
//! # async fn run() -> Result<(), confsync::WatchError> {
//! let keys = Arc::new(MemoryKeyStore::new());
//! keys.set("/app/config", r#"{"username": "svc", "password": "VAULT(secret/password)"}"#);
//! let secrets = Arc::new(MemorySecretStore::new());
//! secrets.set("secret/password", "s3cr3t");
//!
//! let watcher = StoreWatcher::<AppConfig>::new(
//!     keys,
//!     secrets,
//!     WatchOptions::new("/app/config"),
//! ).await?;
//!
//! watcher.add_hook(|old, new| {
//!     println!("user changed: {} -> {}", old.username, new.username);
//!     Ok(())
//! });
//! watcher.watch().await?; // blocks until watcher.close()
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod error;
pub mod secrets;
pub mod store;
pub mod watch;

pub use error::{PlaceholderError, SettingsError, StoreError, WatchError};
pub use secrets::{SecretCache, SecretPoller, SecretScanner, SecretSpec};
pub use store::{
    KeyStore, KeyStoreSettings, MemoryKeyStore, MemorySecretStore, SecretAuth, SecretStore,
    SecretStoreSettings, TlsSettings,
};
pub use watch::{HookResult, StoreWatcher, WatchOptions};
