//! Secret resolution through the full watcher: inline placeholders,
//! schema-declared fields, and pluggable document decoding.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use confsync::{
    MemoryKeyStore, MemorySecretStore, SecretSpec, StoreWatcher, WatchError, WatchOptions,
};

const PATH: &str = "/apps/demo/config";

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct DbConfig {
    addr: String,
    pass: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct AppConfig {
    username: String,
    password: String,
    db: DbConfig,
}

#[tokio::test]
async fn test_nested_placeholders_resolve_on_load() {
    let keys = Arc::new(MemoryKeyStore::new());
    keys.set(
        PATH,
        r#"{
            "username": "svc",
            "password": "VAULT(secret/password)",
            "db": {"addr": "db:5432", "pass": "VAULT(secret/db-pass)"}
        }"#,
    );
    let secrets = Arc::new(MemorySecretStore::new());
    secrets.set("secret/password", "s3cr3t");
    secrets.set("secret/db-pass", "db-s3cr3t");

    let watcher = StoreWatcher::<AppConfig>::new(keys, secrets, WatchOptions::new(PATH))
        .await
        .unwrap();
    let config = watcher.config();
    assert_eq!(config.password, "s3cr3t");
    assert_eq!(config.db.pass, "db-s3cr3t");
    assert_eq!(config.db.addr, "db:5432");
}

#[tokio::test]
async fn test_declared_fields_resolve_without_placeholders() {
    #[derive(Debug, Clone, Deserialize)]
    struct Declared {
        username: String,
        password: String,
    }

    let keys = Arc::new(MemoryKeyStore::new());
    keys.set(PATH, r#"{"username": "svc"}"#);
    let secrets = Arc::new(MemorySecretStore::new());
    secrets.set("secret/password", "s3cr3t");

    let options = WatchOptions::new(PATH)
        .secrets(SecretSpec::new().field("password", "secret/password"));
    let watcher = StoreWatcher::<Declared>::new(keys, secrets, options)
        .await
        .unwrap();
    assert_eq!(watcher.config().password, "s3cr3t");
    assert_eq!(watcher.config().username, "svc");
}

#[tokio::test]
async fn test_yaml_documents_plug_in_through_decode_with() {
    #[derive(Debug, Clone, Deserialize)]
    struct Simple {
        username: String,
        password: String,
    }

    let keys = Arc::new(MemoryKeyStore::new());
    keys.set(PATH, "username: svc\npassword: VAULT(secret/password)\n");
    let secrets = Arc::new(MemorySecretStore::new());
    secrets.set("secret/password", "s3cr3t");

    let options = WatchOptions::new(PATH).decode_with(|raw| {
        let value: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|err| WatchError::Decode(err.to_string()))?;
        serde_json::to_value(value).map_err(|err| WatchError::Decode(err.to_string()))
    });
    let watcher = StoreWatcher::<Simple>::new(keys, secrets, options)
        .await
        .unwrap();
    assert_eq!(watcher.config().password, "s3cr3t");
}

#[tokio::test]
async fn test_malformed_placeholder_written_live_is_isolated() {
    let keys = Arc::new(MemoryKeyStore::new());
    keys.set(
        PATH,
        r#"{
            "username": "svc",
            "password": "VAULT(secret/password)",
            "db": {"addr": "db:5432", "pass": "VAULT(secret/db-pass)"}
        }"#,
    );
    let secrets = Arc::new(MemorySecretStore::new());
    secrets.set("secret/password", "s3cr3t");
    secrets.set("secret/db-pass", "db-s3cr3t");

    let watcher = Arc::new(
        StoreWatcher::<AppConfig>::new(keys.clone(), secrets, WatchOptions::new(PATH))
            .await
            .unwrap(),
    );
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    watcher.on_error(move |err| {
        let _ = err_tx.send(err);
    });

    let handle = {
        let watcher = watcher.clone();
        tokio::spawn(async move { watcher.watch().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A live write with a wrong placeholder namespace: the reload fails,
    // the previous snapshot survives.
    keys.set(
        PATH,
        r#"{
            "username": "svc",
            "password": "VAULT(auth/password)",
            "db": {"addr": "db:5432", "pass": "VAULT(secret/db-pass)"}
        }"#,
    );
    let err = tokio::time::timeout(Duration::from_secs(2), err_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, WatchError::Placeholder(_)));
    assert_eq!(watcher.config().password, "s3cr3t");

    watcher.close().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn test_schema_error_on_non_string_declared_field_is_fatal_at_load() {
    #[derive(Debug, Clone, Deserialize)]
    #[allow(dead_code)]
    struct Bad {
        port: u16,
    }

    let keys = Arc::new(MemoryKeyStore::new());
    keys.set(PATH, r#"{"port": 5432}"#);
    let secrets = Arc::new(MemorySecretStore::new());
    secrets.set("secret/port", "1234");

    let options =
        WatchOptions::new(PATH).secrets(SecretSpec::new().field("port", "secret/port"));
    let err = StoreWatcher::<Bad>::new(keys, secrets, options)
        .await
        .err()
        .expect("construction should fail");
    assert!(matches!(err, WatchError::SecretFieldType { .. }));
}
