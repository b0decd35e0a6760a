//! In-memory store implementations.
//!
//! # Responsibilities
//! - Provide `KeyStore`/`SecretStore` implementations with no I/O
//! - Let tests (and embedders writing their own tests) drive every error
//!   path: missing keys, directory nodes, non-string secrets, closure
//!
//! # Design Decisions
//! - A single `tokio::sync::watch` epoch channel wakes all watchers on any
//!   write; each watcher re-reads its own key and resolves only when that
//!   key's value actually changed
//! - `close` flips a flag and bumps the epoch so blocked watchers observe
//!   `StoreError::Closed` promptly

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::store::{KeyStore, SecretStore};

#[derive(Debug, Clone)]
enum Node {
    Leaf(String),
    Dir,
}

/// An in-memory primary store with long-poll watch semantics.
pub struct MemoryKeyStore {
    nodes: Mutex<HashMap<String, Node>>,
    epoch: watch::Sender<u64>,
    closed: Mutex<bool>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            nodes: Mutex::new(HashMap::new()),
            epoch,
            closed: Mutex::new(false),
        }
    }

    /// Write a leaf value and wake watchers.
    pub fn set(&self, key: &str, value: &str) {
        self.nodes
            .lock()
            .unwrap()
            .insert(key.to_string(), Node::Leaf(value.to_string()));
        self.bump();
    }

    /// Mark a key as a directory node and wake watchers.
    pub fn set_dir(&self, key: &str) {
        self.nodes.lock().unwrap().insert(key.to_string(), Node::Dir);
        self.bump();
    }

    /// Remove a key entirely and wake watchers.
    pub fn remove(&self, key: &str) {
        self.nodes.lock().unwrap().remove(key);
        self.bump();
    }

    fn bump(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.nodes.lock().unwrap().get(key) {
            Some(Node::Leaf(value)) => Ok(Some(value.clone())),
            Some(Node::Dir) => Err(StoreError::UnexpectedDir(key.to_string())),
            None => Ok(None),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        self.lookup(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn watch(&self, key: &str) -> Result<(), StoreError> {
        let mut rx = self.epoch.subscribe();
        // Snapshot taken after subscribing, so no write can slip between.
        let seen = self.lookup(key)?;
        loop {
            if self.is_closed() {
                return Err(StoreError::Closed);
            }
            if rx.changed().await.is_err() {
                return Err(StoreError::Closed);
            }
            if self.is_closed() {
                return Err(StoreError::Closed);
            }
            match self.lookup(key) {
                // A directory appearing under the watched key is an error,
                // not a change notification.
                Err(err) => return Err(err),
                Ok(now) if now != seen => return Ok(()),
                Ok(_) => continue,
            }
        }
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.bump();
    }
}

/// An in-memory secret store.
///
/// Values are stored as JSON values so tests can exercise the
/// [`StoreError::NotText`] path with a non-string secret.
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self {
            secrets: Mutex::new(HashMap::new()),
        }
    }

    /// Write a string secret. Takes effect on the next read, which is how
    /// drift reaches a running poller.
    pub fn set(&self, key: &str, value: &str) {
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    /// Write a raw JSON value, e.g. a number to trigger `NotText`.
    pub fn set_raw(&self, key: &str, value: serde_json::Value) {
        self.secrets.lock().unwrap().insert(key.to_string(), value);
    }

    /// Remove a secret so subsequent reads see `NotFound`.
    pub fn remove(&self, key: &str) {
        self.secrets.lock().unwrap().remove(key);
    }
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        match self.secrets.lock().unwrap().get(key) {
            Some(serde_json::Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(StoreError::NotText(key.to_string())),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}
