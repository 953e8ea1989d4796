//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; every section has defaults so
//! the control plane can run without a file at all. Discovery secrets
//! (API token) come from the environment, never from the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::logging::LogLevel;

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cluster: ClusterOverrides,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Logging section.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".into(),
        }
    }
}

impl LoggingConfig {
    /// Resolve the configured level string; unrecognized values mean INFO.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::parse(&self.level)
    }
}

/// Optional overrides for cluster connection discovery.
#[derive(Debug, Default, Deserialize)]
pub struct ClusterOverrides {
    /// Cluster API endpoint; when unset, discovery falls back to the
    /// environment and in-cluster paths.
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Admission webhook section.
#[derive(Debug, Deserialize)]
pub struct WebhookConfig {
    pub bind_address: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".into(),
        }
    }
}

/// Audit section.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    pub interval_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl AuditConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Controller section.
#[derive(Debug, Deserialize)]
pub struct ControllerConfig {
    pub resync_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { resync_secs: 30 }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn resync(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }
}

/// Lifecycle section.
#[derive(Debug, Deserialize)]
pub struct LifecycleConfig {
    /// Grace period after the run loop returns, letting in-flight work
    /// finish before finalizer cleanup starts.
    pub drain_grace_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_grace_secs: 5,
        }
    }
}

impl LifecycleConfig {
    #[must_use]
    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use built-in defaults.
    #[allow(clippy::result_large_err)]
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.webhook.bind_address.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "webhook.bind_address",
            }
            .into());
        }
        if self.webhook.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "webhook.bind_address",
                reason: format!("'{}' is not a socket address", self.webhook.bind_address),
            }
            .into());
        }
        if self.audit.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audit.interval_secs",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.controller.resync_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "controller.resync_secs",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        Ok(())
    }
}
