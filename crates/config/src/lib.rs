//! Configuration for the autorenew scheduler
//!
//! Configuration is read from a KDL file (preferred) or a TOML file, picked
//! by extension. Without a file the embedded default is used.
//!
//! ```kdl
//! scheduler {
//!     scan-interval-secs 3600
//!     run-on-start #false
//! }
//! store-failure {
//!     policy "retry"
//!     max-attempts 3
//!     escalate-after 24
//! }
//! store { inventory "/var/lib/autorenew/certificates.json" }
//! issuer { endpoint "http://127.0.0.1:8080/api/renew" }
//! ```

pub mod kdl;
pub mod scheduler;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use validator::Validate;

pub use scheduler::{
    IssuerConfig, SchedulerConfig, StoreConfig, StoreFailureConfig, StoreFailurePolicy,
};

/// Embedded default configuration
const DEFAULT_CONFIG_KDL: &str = r#"
scheduler {
    scan-interval-secs 3600
    run-on-start #false
}
store-failure {
    policy "retry"
}
store {
    inventory "/var/lib/autorenew/certificates.json"
}
issuer {
    dry-run #true
}
"#;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported configuration format '{0}' (expected .kdl or .toml)")]
    UnsupportedFormat(String),

    #[error("failed to parse configuration: {0:#}")]
    Parse(#[from] anyhow::Error),

    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete scheduler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub store_failure: StoreFailureConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub issuer: IssuerConfig,
}

impl Config {
    /// Load configuration from a `.kdl` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        debug!(path = %path.display(), format = %extension, "Loading configuration file");

        let config = match extension.as_str() {
            "kdl" => Self::from_kdl(&content)?,
            "toml" => Self::from_toml(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_kdl(content: &str) -> Result<Self, ConfigError> {
        Ok(kdl::parse_kdl_document(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load the embedded default configuration
    pub fn default_embedded() -> Result<Self, ConfigError> {
        Self::from_kdl(DEFAULT_CONFIG_KDL)
    }

    /// Defaults with a dry-run issuer, for tests
    pub fn default_for_testing() -> Self {
        Self {
            issuer: IssuerConfig {
                dry_run: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Check ranges and cross-field constraints.
    ///
    /// Runs on every load. The environment checks in [`validate`] are only
    /// run by `--test`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Validate::validate(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let failure = &self.store_failure;
        if failure.max_backoff_ms < failure.initial_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "max-backoff-ms ({}) must not be smaller than initial-backoff-ms ({})",
                failure.max_backoff_ms, failure.initial_backoff_ms
            )));
        }

        let breaker = &failure.circuit_breaker;
        if breaker.failure_threshold == 0
            || breaker.success_threshold == 0
            || breaker.half_open_max_requests == 0
        {
            return Err(ConfigError::Invalid(
                "circuit-breaker thresholds and half-open-max-requests must be at least 1"
                    .to_string(),
            ));
        }
        if breaker.success_threshold > breaker.half_open_max_requests {
            return Err(ConfigError::Invalid(format!(
                "circuit-breaker success-threshold ({}) must not exceed half-open-max-requests ({})",
                breaker.success_threshold, breaker.half_open_max_requests
            )));
        }

        if let Some(ref endpoint) = self.issuer.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                ConfigError::Invalid(format!("issuer endpoint '{}': {}", endpoint, e))
            })?;
        }

        Ok(())
    }
}
