//! Pluggable document decoding.
//!
//! The engine works on a `serde_json::Value` tree internally; any format
//! that can produce one plugs in through [`DecodeFn`]. JSON is the default.

use std::sync::Arc;

use crate::error::WatchError;

/// Turns the raw primary-store document into a JSON value tree.
pub type DecodeFn = Arc<dyn Fn(&str) -> Result<serde_json::Value, WatchError> + Send + Sync>;

/// The default JSON decoder.
pub fn json() -> DecodeFn {
    Arc::new(|raw: &str| {
        serde_json::from_str(raw).map_err(|err| WatchError::Decode(err.to_string()))
    })
}
