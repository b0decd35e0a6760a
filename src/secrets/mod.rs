//! Secret resolution subsystem.
//!
//! # Data Flow
//! ```text
//! decoded document (serde_json::Value)
//!     → scanner.rs (resolve declared fields + VAULT(...) placeholders)
//!     → resolved document, ready to deserialize into the user type
//!     → SecretCache records key → value for every resolution
//!
//! poller.rs re-reads every cached key on an interval
//!     → first value mismatch emits one reload signal
//! ```
//!
//! # Design Decisions
//! - The secret store has no native change notification, so drift is found
//!   by polling the exact values the last scan resolved
//! - Cache entries are never removed; a key that drops out of the document
//!   simply stops producing drift after the next scan overwrites the rest

pub mod placeholder;
pub mod poller;
pub mod scanner;

pub use placeholder::parse_placeholder;
pub use poller::SecretPoller;
pub use scanner::{SecretScanner, SecretSpec};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Mapping from secret key to its last-resolved value.
///
/// Written by the scanner during a reload and read by the poller on each
/// tick; the two run concurrently, hence the lock. The cache exists only
/// for drift detection, never for serving reads.
#[derive(Clone, Default)]
pub struct SecretCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value a key resolved to.
    pub fn insert(&self, key: &str, value: &str) {
        self.inner
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Copy out the tracked (key, value) pairs for one poll sweep.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}
