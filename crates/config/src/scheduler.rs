//! Scheduler, store and issuer configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use autorenew_common::CircuitBreakerConfig;

// ============================================================================
// Scheduler
// ============================================================================

/// Scan cadence and per-call limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Time between the end of one wait and the next scan
    #[serde(default = "default_scan_interval_secs")]
    #[validate(range(min = 1))]
    pub scan_interval_secs: u64,

    /// Run a scan immediately at startup instead of waiting one interval
    #[serde(default)]
    pub run_on_start: bool,

    /// Upper bound on a single certificate store listing
    #[serde(default = "default_store_timeout_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub store_timeout_secs: u64,

    /// Upper bound on a single issuer renewal call
    #[serde(default = "default_renew_timeout_secs")]
    #[validate(range(min = 1, max = 86400))]
    pub renew_timeout_secs: u64,

    /// Cap on renewals in flight within one cycle (unset: no cap)
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_concurrent_renewals: Option<usize>,

    /// Capacity of the manual trigger channel
    #[serde(default = "default_trigger_capacity")]
    #[validate(range(min = 1, max = 65536))]
    pub trigger_capacity: usize,
}

pub(crate) fn default_scan_interval_secs() -> u64 {
    3600
}

pub(crate) fn default_store_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_renew_timeout_secs() -> u64 {
    300
}

pub(crate) fn default_trigger_capacity() -> usize {
    32
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            run_on_start: false,
            store_timeout_secs: default_store_timeout_secs(),
            renew_timeout_secs: default_renew_timeout_secs(),
            max_concurrent_renewals: None,
            trigger_capacity: default_trigger_capacity(),
        }
    }
}

impl SchedulerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn renew_timeout(&self) -> Duration {
        Duration::from_secs(self.renew_timeout_secs)
    }
}

// ============================================================================
// Store failure handling
// ============================================================================

/// What a failed certificate listing does to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFailurePolicy {
    /// Stop the scheduler on the first failed listing
    Fatal,
    /// Retry with backoff, skip the cycle, escalate after repeated failures
    #[default]
    Retry,
}

impl StoreFailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fatal" => Some(Self::Fatal),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreFailurePolicy::Fatal => write!(f, "fatal"),
            StoreFailurePolicy::Retry => write!(f, "retry"),
        }
    }
}

/// Store failure handling: in-cycle retries, breaker and escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct StoreFailureConfig {
    #[serde(default)]
    pub policy: StoreFailurePolicy,

    /// Listing attempts per cycle, the first one included
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for every following one
    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 1))]
    pub initial_backoff_ms: u64,

    /// Ceiling for the retry delay
    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 1))]
    pub max_backoff_ms: u64,

    /// Consecutive failed cycles before giving up (0: never)
    #[serde(default = "default_escalate_after")]
    pub escalate_after: u32,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

pub(crate) fn default_max_attempts() -> u32 {
    3
}

pub(crate) fn default_initial_backoff_ms() -> u64 {
    500
}

pub(crate) fn default_max_backoff_ms() -> u64 {
    30_000
}

pub(crate) fn default_escalate_after() -> u32 {
    24
}

impl Default for StoreFailureConfig {
    fn default() -> Self {
        Self {
            policy: StoreFailurePolicy::default(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            escalate_after: default_escalate_after(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl StoreFailureConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Where the certificate inventory is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// JSON file listing every known certificate, re-read on each cycle
    #[serde(default = "default_inventory")]
    pub inventory: PathBuf,
}

pub(crate) fn default_inventory() -> PathBuf {
    PathBuf::from("/var/lib/autorenew/certificates.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            inventory: default_inventory(),
        }
    }
}

/// Issuance service the scheduler hands renewals to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IssuerConfig {
    /// Renewal endpoint; each renewal is POSTed here as JSON
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with renewal requests
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Log renewals instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

impl IssuerConfig {
    /// Whether renewals will actually leave the process
    pub fn is_live(&self) -> bool {
        !self.dry_run && self.endpoint.is_some()
    }
}
