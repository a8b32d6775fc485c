mod connection;
mod dispatch;
mod keepalive;

pub use connection::*;
pub use dispatch::*;
pub use keepalive::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Parse a config from TOML text.  Missing sections and fields fall
    /// back to their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Network version byte for the configured network.
    pub fn network_version(&self) -> u8 {
        self.connection.network.version()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.connection.url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "connection.url".into(),
                message: "url must not be empty".into(),
            });
        } else if !(self.connection.url.starts_with("ws://")
            || self.connection.url.starts_with("wss://"))
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "connection.url".into(),
                message: "url must use the ws:// or wss:// scheme".into(),
            });
        } else if self.connection.url.starts_with("ws://") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "connection.url".into(),
                message: "plain ws:// sends the signed challenge unencrypted".into(),
            });
        }

        if self.connection.realm.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "connection.realm".into(),
                message: "realm must not be empty".into(),
            });
        }

        if self.keepalive.interval_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "keepalive.interval_secs".into(),
                message: "interval must be greater than 0".into(),
            });
        }

        if self.keepalive.procedure.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "keepalive.procedure".into(),
                message: "heartbeat procedure must not be empty".into(),
            });
        }

        if self.dispatch.effect_procedure.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "dispatch.effect_procedure".into(),
                message: "effect procedure must not be empty".into(),
            });
        }

        if self.dispatch.queue_concurrency == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "dispatch.queue_concurrency".into(),
                message: "queue concurrency must be at least 1".into(),
            });
        }

        errors
    }

    /// `true` when [`validate`](Self::validate) reports no `Error`-severity issues.
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|e| e.severity != ConfigSeverity::Error)
    }
}
