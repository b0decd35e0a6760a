//! Backend settings.
//!
//! # Responsibilities
//! - Describe how a host process connects its stores: cluster addresses,
//!   optional TLS material, credentials, auth method, polling interval
//! - Validate everything up front, before any network call is attempted
//!
//! # Design Decisions
//! - Settings are consumed, not produced, by the engine; transports read
//!   them when building a concrete `KeyStore`/`SecretStore`
//! - Auth selection returns a typed error for a missing parameter instead
//!   of failing deep inside an authentication call
//! - The polling interval is a duration string ("300s", "5m", "1h") so it
//!   can live alongside the rest of a deployment's config

use std::time::Duration;

use serde::Deserialize;

use crate::error::SettingsError;

/// Default interval between secret drift sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Client TLS material, given as file paths.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Path to the client certificate (PEM).
    pub cert: Option<String>,
    /// Path to the client certificate's key (PEM).
    pub key: Option<String>,
    /// Path to the CA certificate bundle (PEM).
    pub ca_cert: Option<String>,
}

impl TlsSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if self.cert.is_some() != self.key.is_some() {
            return Err(SettingsError::IncompleteTls);
        }
        Ok(())
    }
}

/// Settings for the primary key/value store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeyStoreSettings {
    /// Cluster addresses, e.g. `["http://localhost:2379"]`.
    pub clusters: Vec<String>,
    /// Optional basic-auth credentials.
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsSettings,
}

impl KeyStoreSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.clusters.is_empty() {
            return Err(SettingsError::MissingClusters);
        }
        self.tls.validate()
    }
}

/// A fully resolved secret store auth method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretAuth {
    Token { token: String },
    AppId { app_id: String, user_id: String },
    Github { token: String },
    UserPass { username: String, password: String },
}

/// Settings for the secret store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretStoreSettings {
    /// Store address, e.g. `"http://localhost:8200"`.
    pub address: String,
    /// Selected auth method: `"token"`, `"app-id"`, `"github"` or
    /// `"userpass"`.
    pub auth_type: Option<String>,
    pub token: Option<String>,
    pub app_id: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsSettings,
    /// Interval between drift sweeps, as a duration string. Defaults to
    /// five minutes when absent.
    pub poll_interval: Option<String>,
}

impl SecretStoreSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.address.is_empty() {
            return Err(SettingsError::MissingAddress);
        }
        self.tls.validate()?;
        self.auth()?;
        self.interval()?;
        Ok(())
    }

    /// Resolve the declared auth method, checking its parameters.
    pub fn auth(&self) -> Result<SecretAuth, SettingsError> {
        let auth_type = match self.auth_type.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return Err(SettingsError::MissingAuthType),
        };
        match auth_type {
            "token" => Ok(SecretAuth::Token {
                token: self.require(self.token.as_deref(), "token")?,
            }),
            "app-id" => Ok(SecretAuth::AppId {
                app_id: self.require(self.app_id.as_deref(), "app_id")?,
                user_id: self.require(self.user_id.as_deref(), "user_id")?,
            }),
            "github" => Ok(SecretAuth::Github {
                token: self.require(self.token.as_deref(), "token")?,
            }),
            "userpass" => Ok(SecretAuth::UserPass {
                username: self.require(self.username.as_deref(), "username")?,
                password: self.require(self.password.as_deref(), "password")?,
            }),
            other => Err(SettingsError::UnknownAuthType(other.to_string())),
        }
    }

    /// The effective polling interval.
    pub fn interval(&self) -> Result<Duration, SettingsError> {
        match self.poll_interval.as_deref() {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    fn require(
        &self,
        value: Option<&str>,
        name: &'static str,
    ) -> Result<String, SettingsError> {
        match value {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(SettingsError::MissingParameter(name)),
        }
    }
}

/// Parse a duration string: an integer followed by `ms`, `s`, `m` or `h`.
pub fn parse_duration(raw: &str) -> Result<Duration, SettingsError> {
    let invalid = || SettingsError::InvalidDuration(raw.to_string());
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let scaled = |factor: u64| amount.checked_mul(factor).ok_or_else(invalid);
    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(scaled(60)?)),
        "h" => Ok(Duration::from_secs(scaled(3600)?)),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for raw in ["", "5", "m5", "5 m", "5d", "-5s", "9300000000000000000h"] {
            assert!(
                matches!(parse_duration(raw), Err(SettingsError::InvalidDuration(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_key_store_settings_need_clusters() {
        let settings = KeyStoreSettings::default();
        assert_eq!(settings.validate(), Err(SettingsError::MissingClusters));

        let settings = KeyStoreSettings {
            clusters: vec!["http://localhost:2379".into()],
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_tls_needs_cert_and_key_together() {
        let settings = KeyStoreSettings {
            clusters: vec!["http://localhost:2379".into()],
            tls: TlsSettings {
                cert: Some("client.pem".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::IncompleteTls));
    }

    #[test]
    fn test_auth_type_is_required() {
        let settings = SecretStoreSettings {
            address: "http://localhost:8200".into(),
            ..Default::default()
        };
        assert_eq!(settings.auth(), Err(SettingsError::MissingAuthType));
    }

    #[test]
    fn test_auth_missing_parameter_is_an_error_not_a_panic() {
        let settings = SecretStoreSettings {
            address: "http://localhost:8200".into(),
            auth_type: Some("userpass".into()),
            username: Some("svc".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.auth(),
            Err(SettingsError::MissingParameter("password"))
        );
    }

    #[test]
    fn test_auth_methods_resolve() {
        let settings = SecretStoreSettings {
            address: "http://localhost:8200".into(),
            auth_type: Some("token".into()),
            token: Some("t0ken".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.auth().unwrap(),
            SecretAuth::Token { token: "t0ken".into() }
        );

        let settings = SecretStoreSettings {
            address: "http://localhost:8200".into(),
            auth_type: Some("app-id".into()),
            app_id: Some("1".into()),
            user_id: Some("2".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.auth().unwrap(),
            SecretAuth::AppId { app_id: "1".into(), user_id: "2".into() }
        );
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SecretStoreSettings = serde_json::from_str(
            r#"{
                "address": "http://localhost:8200",
                "auth_type": "github",
                "token": "gh",
                "poll_interval": "30s"
            }"#,
        )
        .unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.interval().unwrap(), Duration::from_secs(30));
        assert_eq!(
            settings.auth().unwrap(),
            SecretAuth::Github { token: "gh".into() }
        );
    }
}
