//! Secret scanning over a decoded configuration document.
//!
//! # Responsibilities
//! - Resolve fields declared up front as secret references (`SecretSpec`)
//! - Find and resolve inline `VAULT(secret/...)` placeholders anywhere in
//!   the document tree
//! - Record every resolution in the `SecretCache` for drift polling
//!
//! # Design Decisions
//! - The scan runs on the `serde_json::Value` tree, before the document is
//!   deserialized into the user type; the declarations built at
//!   construction time take the place of runtime field reflection
//! - On any failure the caller discards the partially resolved tree; the
//!   previous snapshot stays published

use std::sync::Arc;

use crate::error::WatchError;
use crate::secrets::placeholder::{looks_like_placeholder, parse_placeholder};
use crate::secrets::SecretCache;
use crate::store::SecretStore;

/// Construction-time declaration of secret-reference fields.
///
/// Each entry names a field by dotted path and the secret key backing it,
/// for documents that do not embed the placeholder syntax themselves:
///
/// ```
/// use confsync::SecretSpec;
///
/// let spec = SecretSpec::new()
///     .field("database.password", "secret/db-password")
///     .field("api.token", "secret/api-token");
/// ```
#[derive(Clone, Default)]
pub struct SecretSpec {
    fields: Vec<(String, String)>,
}

impl SecretSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that the field at `path` (dotted, e.g. `"database.password"`)
    /// is backed by `secret_key`. Declarations resolve in insertion order.
    pub fn field(mut self, path: &str, secret_key: &str) -> Self {
        self.fields
            .push((path.to_string(), secret_key.to_string()));
        self
    }
}

/// Walks a decoded document, substituting secret references in place.
pub struct SecretScanner {
    store: Arc<dyn SecretStore>,
    cache: SecretCache,
    spec: SecretSpec,
}

impl SecretScanner {
    pub fn new(store: Arc<dyn SecretStore>, cache: SecretCache, spec: SecretSpec) -> Self {
        Self { store, cache, spec }
    }

    /// Resolve every secret reference in `root`.
    ///
    /// On success each reference holds its live value and the cache has an
    /// entry for it. On failure the error carries the offending key and the
    /// tree is partially resolved; discard it.
    pub async fn resolve(&self, root: &mut serde_json::Value) -> Result<(), WatchError> {
        if !root.is_object() {
            return Err(WatchError::NotARecord {
                found: value_kind(root),
            });
        }

        for (path, secret_key) in &self.spec.fields {
            self.resolve_declared(root, path, secret_key).await?;
        }

        // Inline placeholders: collect first (the walk is synchronous),
        // then resolve sequentially.
        let mut found = Vec::new();
        collect_placeholders(root, String::new(), &mut found)?;
        for (pointer, secret_key) in found {
            let value = self.fetch(&secret_key).await?;
            if let Some(slot) = root.pointer_mut(&pointer) {
                *slot = serde_json::Value::String(value);
            }
        }
        Ok(())
    }

    /// Resolve one declared field. The declaration is authoritative: an
    /// absent path is created, an existing non-string value is a schema bug.
    async fn resolve_declared(
        &self,
        root: &mut serde_json::Value,
        path: &str,
        secret_key: &str,
    ) -> Result<(), WatchError> {
        let slot = lookup_dotted(root, path)?;
        if let Some(existing) = &slot {
            if !existing.is_string() && !existing.is_null() {
                return Err(WatchError::SecretFieldType {
                    path: path.to_string(),
                    found: value_kind(existing),
                });
            }
        }
        let value = self.fetch(secret_key).await?;
        set_dotted(root, path, serde_json::Value::String(value))?;
        Ok(())
    }

    async fn fetch(&self, secret_key: &str) -> Result<String, WatchError> {
        let value = self
            .store
            .get(secret_key)
            .await
            .map_err(|source| WatchError::Secret {
                key: secret_key.to_string(),
                source,
            })?;
        self.cache.insert(secret_key, &value);
        Ok(value)
    }
}

fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Gather `(json-pointer, secret-key)` pairs for every placeholder string.
fn collect_placeholders(
    value: &serde_json::Value,
    pointer: String,
    out: &mut Vec<(String, String)>,
) -> Result<(), WatchError> {
    match value {
        serde_json::Value::String(raw) if looks_like_placeholder(raw) => {
            let key = parse_placeholder(raw)?;
            out.push((pointer, key.to_string()));
        }
        serde_json::Value::Object(map) => {
            for (name, child) in map {
                let escaped = name.replace('~', "~0").replace('/', "~1");
                collect_placeholders(child, format!("{pointer}/{escaped}"), out)?;
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_placeholders(child, format!("{pointer}/{index}"), out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Read the value at a dotted path, if present.
fn lookup_dotted<'a>(
    root: &'a serde_json::Value,
    path: &str,
) -> Result<Option<&'a serde_json::Value>, WatchError> {
    let mut current = root;
    for segment in path.split('.') {
        match current {
            serde_json::Value::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            },
            other => {
                return Err(WatchError::SecretFieldType {
                    path: path.to_string(),
                    found: value_kind(other),
                })
            }
        }
    }
    Ok(Some(current))
}

/// Write `value` at a dotted path, creating intermediate objects.
fn set_dotted(
    root: &mut serde_json::Value,
    path: &str,
    value: serde_json::Value,
) -> Result<(), WatchError> {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (index, segment) in segments.iter().enumerate() {
        let map = match current {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(WatchError::SecretFieldType {
                    path: path.to_string(),
                    found: value_kind(other),
                })
            }
        };
        if index == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemorySecretStore;
    use serde_json::json;

    fn scanner(store: Arc<MemorySecretStore>, spec: SecretSpec) -> (SecretScanner, SecretCache) {
        let cache = SecretCache::new();
        (SecretScanner::new(store, cache.clone(), spec), cache)
    }

    #[tokio::test]
    async fn test_placeholder_resolution_round_trip() {
        let store = Arc::new(MemorySecretStore::new());
        store.set("secret/password", "s3cr3t");
        let (scanner, cache) = scanner(store, SecretSpec::new());

        let mut doc = json!({
            "username": "svc",
            "password": "VAULT(secret/password)"
        });
        scanner.resolve(&mut doc).await.unwrap();

        assert_eq!(doc["password"], "s3cr3t");
        assert_eq!(doc["username"], "svc");
        assert_eq!(cache.get("secret/password").as_deref(), Some("s3cr3t"));
    }

    #[tokio::test]
    async fn test_nested_and_array_placeholders() {
        let store = Arc::new(MemorySecretStore::new());
        store.set("secret/a", "A");
        store.set("secret/b", "B");
        let (scanner, cache) = scanner(store, SecretSpec::new());

        let mut doc = json!({
            "outer": { "inner": "VAULT(secret/a)" },
            "list": ["plain", "VAULT(secret/b)"]
        });
        scanner.resolve(&mut doc).await.unwrap();

        assert_eq!(doc["outer"]["inner"], "A");
        assert_eq!(doc["list"][1], "B");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_placeholder_leaves_cache_empty() {
        let store = Arc::new(MemorySecretStore::new());
        let (scanner, cache) = scanner(store, SecretSpec::new());

        let mut doc = json!({ "password": "VAULT(auth/x)" });
        let err = scanner.resolve(&mut doc).await.unwrap_err();
        assert!(matches!(err, WatchError::Placeholder(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_names_the_key() {
        let store = Arc::new(MemorySecretStore::new());
        let (scanner, cache) = scanner(store, SecretSpec::new());

        let mut doc = json!({ "password": "VAULT(secret/absent)" });
        let err = scanner.resolve(&mut doc).await.unwrap_err();
        match err {
            WatchError::Secret { key, source } => {
                assert_eq!(key, "secret/absent");
                assert!(matches!(source, StoreError::NotFound(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_declared_field_overwrites_and_creates() {
        let store = Arc::new(MemorySecretStore::new());
        store.set("secret/db", "db-pass");
        store.set("secret/api", "api-token");
        let spec = SecretSpec::new()
            .field("database.password", "secret/db")
            .field("api.token", "secret/api");
        let (scanner, cache) = scanner(store, spec);

        // "database.password" exists, "api" is absent entirely.
        let mut doc = json!({ "database": { "password": "", "port": 5432 } });
        scanner.resolve(&mut doc).await.unwrap();

        assert_eq!(doc["database"]["password"], "db-pass");
        assert_eq!(doc["api"]["token"], "api-token");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_declared_non_string_field_is_a_schema_error() {
        let store = Arc::new(MemorySecretStore::new());
        store.set("secret/db", "db-pass");
        let spec = SecretSpec::new().field("database.port", "secret/db");
        let (scanner, _) = scanner(store, spec);

        let mut doc = json!({ "database": { "port": 5432 } });
        let err = scanner.resolve(&mut doc).await.unwrap_err();
        assert!(matches!(
            err,
            WatchError::SecretFieldType { found: "number", .. }
        ));
    }

    #[tokio::test]
    async fn test_top_level_must_be_a_record() {
        let store = Arc::new(MemorySecretStore::new());
        let (scanner, _) = scanner(store, SecretSpec::new());

        let mut doc = json!(["not", "an", "object"]);
        assert!(matches!(
            scanner.resolve(&mut doc).await,
            Err(WatchError::NotARecord { found: "array" })
        ));
    }

    #[tokio::test]
    async fn test_non_string_secret_value_is_rejected() {
        let store = Arc::new(MemorySecretStore::new());
        store.set_raw("secret/count", json!(42));
        let (scanner, cache) = scanner(store, SecretSpec::new());

        let mut doc = json!({ "count": "VAULT(secret/count)" });
        let err = scanner.resolve(&mut doc).await.unwrap_err();
        assert!(matches!(
            err,
            WatchError::Secret { source: StoreError::NotText(_), .. }
        ));
        assert!(cache.is_empty());
    }
}
