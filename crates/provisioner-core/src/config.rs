//! Endpoint and stream configuration
//!
//! Endpoints are URL templates with `:id`, `:prompt_id` and `:domain`
//! placeholders. Every endpoint is optional: an action whose endpoint is
//! missing fails locally without reaching the network.
//!
//! Resolution order used by the CLI: built-in paths under
//! `PROVISIONER_BASE_URL`, then a JSON config file, then per-endpoint
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Env var holding the installer base URL
pub const BASE_URL_ENV: &str = "PROVISIONER_BASE_URL";

/// Env var overriding the reconnect budget of the event stream
pub const MAX_RECONNECTS_ENV: &str = "PROVISIONER_MAX_RECONNECTS";

/// Dashboard ping used to check a freshly installed cluster's certificate
pub const DEFAULT_CERT_PING: &str = "https://dashboard.:domain/ping";

/// Default number of automatic event-stream reconnects
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Provisioning service endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub credentials: Option<String>,
    pub regions: Option<String>,
    pub azure_subscriptions: Option<String>,
    pub clusters: Option<String>,
    /// `:id`
    pub cluster: Option<String>,
    /// `:id`
    pub upload_backup: Option<String>,
    /// `:id`, `:prompt_id`
    pub prompt: Option<String>,
    /// `:domain`
    pub cert_ping: Option<String>,
    pub events: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            credentials: None,
            regions: None,
            azure_subscriptions: None,
            clusters: None,
            cluster: None,
            upload_backup: None,
            prompt: None,
            cert_ping: Some(DEFAULT_CERT_PING.to_string()),
            events: None,
        }
    }
}

impl Endpoints {
    /// Standard installer paths under `base`
    pub fn from_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let at = |path: &str| Some(format!("{}{}", base, path));
        Self {
            credentials: at("/credentials"),
            regions: at("/regions"),
            azure_subscriptions: at("/azure/subscriptions"),
            clusters: at("/clusters"),
            cluster: at("/clusters/:id"),
            upload_backup: at("/clusters/:id/upload-backup"),
            prompt: at("/clusters/:id/prompts/:prompt_id"),
            cert_ping: Some(DEFAULT_CERT_PING.to_string()),
            events: at("/events"),
        }
    }

    /// Load endpoints from a JSON file using the field names of this struct
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Resolve endpoints from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve endpoints from `PROVISIONER_*` variables served by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match lookup(BASE_URL_ENV) {
            Some(url) if !url.is_empty() => Self::from_base_url(&url),
            _ => Self::default(),
        };
        base.merge(Self::overrides_from(lookup))
    }

    /// Resolve endpoints in the documented order: standard paths under
    /// `base_url`, then `file`, then per-endpoint variables from `lookup`
    pub fn resolve<F>(
        base_url: Option<&str>,
        file: Option<&Path>,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut endpoints = match base_url.filter(|url| !url.is_empty()) {
            Some(url) => Self::from_base_url(url),
            None => Self::default(),
        };
        if let Some(path) = file {
            endpoints = endpoints.merge(Self::from_file(path)?);
        }
        Ok(endpoints.merge(Self::overrides_from(lookup)))
    }

    fn overrides_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            credentials: var("PROVISIONER_CREDENTIALS_URL"),
            regions: var("PROVISIONER_REGIONS_URL"),
            azure_subscriptions: var("PROVISIONER_AZURE_SUBSCRIPTIONS_URL"),
            clusters: var("PROVISIONER_CLUSTERS_URL"),
            cluster: var("PROVISIONER_CLUSTER_URL"),
            upload_backup: var("PROVISIONER_UPLOAD_BACKUP_URL"),
            prompt: var("PROVISIONER_PROMPT_URL"),
            cert_ping: var("PROVISIONER_CERT_PING_URL"),
            events: var("PROVISIONER_EVENTS_URL"),
        }
    }

    /// Fields set in `other` replace the ones in `self`
    pub fn merge(self, other: Endpoints) -> Self {
        Self {
            credentials: other.credentials.or(self.credentials),
            regions: other.regions.or(self.regions),
            azure_subscriptions: other.azure_subscriptions.or(self.azure_subscriptions),
            clusters: other.clusters.or(self.clusters),
            cluster: other.cluster.or(self.cluster),
            upload_backup: other.upload_backup.or(self.upload_backup),
            prompt: other.prompt.or(self.prompt),
            cert_ping: other.cert_ping.or(self.cert_ping),
            events: other.events.or(self.events),
        }
    }
}

/// Substitute `placeholders` (e.g. `(":id", "c1")`) into `template`
pub fn fill_template(template: &str, placeholders: &[(&str, &str)]) -> String {
    placeholders
        .iter()
        .fold(template.to_string(), |url, (key, value)| url.replace(key, value))
}

/// Event stream settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Automatic reconnects over the consumer's whole lifetime
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl StreamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(MAX_RECONNECTS_ENV) {
            None => Ok(Self::default()),
            Some(value) => value
                .trim()
                .parse()
                .map(|max_reconnect_attempts| Self {
                    max_reconnect_attempts,
                })
                .map_err(|_| ConfigError::InvalidValue {
                    key: MAX_RECONNECTS_ENV,
                    value,
                }),
        }
    }
}
