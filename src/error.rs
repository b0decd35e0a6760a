//! Error definitions for the watch-and-reload engine.
//!
//! # Design Decisions
//! - Two layers: `StoreError` for the backend contracts, `WatchError` for
//!   everything the coordinator can report
//! - Backend and data failures are values, never panics; only contract
//!   violations (e.g. an empty primary path) surface at construction
//! - Distinct kinds where callers branch on them: a directory result is not
//!   a missing key, a missing secret is not a transport hiccup

use thiserror::Error;

/// Errors produced by the backend store contracts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist in the store.
    #[error("key {0:?} does not exist")]
    NotFound(String),

    /// The key names a directory, not a leaf value. The primary path must
    /// denote a scalar document.
    #[error("key {0:?} is a directory, not a leaf value")]
    UnexpectedDir(String),

    /// The stored value is not representable as a single string.
    #[error("value for key {0:?} is not a string")]
    NotText(String),

    /// The client was closed; in-flight watches return this promptly.
    #[error("store client closed")]
    Closed,

    /// Network or transport failure. Retryable.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Whether a watch loop may retry after this error. Only closure ends
    /// the loop; a missing, misclassified or unreachable key can come back.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::Closed)
    }
}

/// Errors reported by the watcher, either synchronously from construction
/// or through the error sink during live operation.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Primary store read or watch failure.
    #[error("primary store: {0}")]
    Store(#[from] StoreError),

    /// The fetched document failed to decode.
    #[error("decode config document: {0}")]
    Decode(String),

    /// A secret key failed to resolve against the secret store.
    #[error("resolve secret {key:?}: {source}")]
    Secret {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A string value looked like a secret placeholder but did not parse.
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    /// A field declared as a secret reference is not a textual field.
    #[error("secret field {path:?} must be a string, found {found}")]
    SecretFieldType { path: String, found: &'static str },

    /// The scanned document root is not a record.
    #[error("config document must be an object, found {found}")]
    NotARecord { found: &'static str },

    /// Invalid backend or watcher settings. Construction-fatal.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A reload hook returned an error. The snapshot is already committed;
    /// later hooks still ran.
    #[error("reload hook #{index} failed: {source}")]
    Hook {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `watch` was called while the dispatch loop is (or was) already running.
    #[error("watcher is already watching or closed")]
    AlreadyWatching,
}

/// Rejections of the `VAULT(secret/...)` placeholder syntax.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    /// The value does not start with the required prefix. Surrounding
    /// whitespace is not tolerated.
    #[error("secret placeholder {value:?} has no prefix {expected:?}")]
    MissingPrefix { value: String, expected: &'static str },

    /// The value lacks the closing delimiter.
    #[error("secret placeholder {value:?} has no closing {expected:?}")]
    MissingSuffix { value: String, expected: &'static str },
}

/// Invalid backend settings, detected before any network call is attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// No primary configuration path was supplied.
    #[error("primary configuration path must not be empty")]
    MissingPath,

    /// The key store needs at least one cluster address.
    #[error("key store settings need at least one cluster address")]
    MissingClusters,

    /// The secret store needs an address.
    #[error("secret store settings need an address")]
    MissingAddress,

    /// No auth method was selected for the secret store.
    #[error("you have to set the auth type when using the secret store backend")]
    MissingAuthType,

    /// The selected auth method needs a parameter that was not supplied.
    #[error("{0} is missing from the secret store settings")]
    MissingParameter(&'static str),

    /// The declared auth type is not one of the supported methods.
    #[error("unknown auth type {0:?}")]
    UnknownAuthType(String),

    /// TLS client material must be supplied as a cert/key pair.
    #[error("tls settings need both a certificate and a key")]
    IncompleteTls,

    /// The polling interval string did not parse.
    #[error("invalid duration {0:?}, expected forms like \"90s\", \"5m\", \"1h\"")]
    InvalidDuration(String),
}
