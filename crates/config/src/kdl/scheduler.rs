//! Scheduler, store-failure, store and issuer KDL parsing.

use anyhow::{anyhow, Result};
use tracing::{trace, warn};

use autorenew_common::CircuitBreakerConfig;

use crate::scheduler::*;

use super::helpers::{
    get_bool_entry, get_child_node, get_string_entry, get_u32_entry, get_u64_entry,
    unknown_entries,
};

fn warn_unknown(node: &kdl::KdlNode, known: &[&str]) {
    for name in unknown_entries(node, known) {
        warn!(block = node.name().value(), entry = name, "Ignoring unknown configuration entry");
    }
}

/// Parse the `scheduler { ... }` block
pub fn parse_scheduler_config(node: &kdl::KdlNode) -> Result<SchedulerConfig> {
    trace!("Parsing scheduler configuration block");
    warn_unknown(
        node,
        &[
            "scan-interval-secs",
            "run-on-start",
            "store-timeout-secs",
            "renew-timeout-secs",
            "max-concurrent-renewals",
            "trigger-capacity",
        ],
    );

    let config = SchedulerConfig {
        scan_interval_secs: get_u64_entry(node, "scan-interval-secs")?
            .unwrap_or_else(default_scan_interval_secs),
        run_on_start: get_bool_entry(node, "run-on-start")?.unwrap_or(false),
        store_timeout_secs: get_u64_entry(node, "store-timeout-secs")?
            .unwrap_or_else(default_store_timeout_secs),
        renew_timeout_secs: get_u64_entry(node, "renew-timeout-secs")?
            .unwrap_or_else(default_renew_timeout_secs),
        max_concurrent_renewals: get_u64_entry(node, "max-concurrent-renewals")?
            .map(|v| v as usize),
        trigger_capacity: get_u64_entry(node, "trigger-capacity")?
            .map(|v| v as usize)
            .unwrap_or_else(default_trigger_capacity),
    };

    trace!(
        scan_interval_secs = config.scan_interval_secs,
        run_on_start = config.run_on_start,
        max_concurrent_renewals = ?config.max_concurrent_renewals,
        "Parsed scheduler configuration"
    );

    Ok(config)
}

/// Parse the `store-failure { ... }` block
pub fn parse_store_failure_config(node: &kdl::KdlNode) -> Result<StoreFailureConfig> {
    trace!("Parsing store-failure configuration block");
    warn_unknown(
        node,
        &[
            "policy",
            "max-attempts",
            "initial-backoff-ms",
            "max-backoff-ms",
            "escalate-after",
            "circuit-breaker",
        ],
    );

    let policy = match get_string_entry(node, "policy")? {
        Some(s) => StoreFailurePolicy::parse(&s).ok_or_else(|| {
            anyhow!(
                "Invalid store failure policy '{}'. Valid policies: fatal, retry",
                s
            )
        })?,
        None => StoreFailurePolicy::default(),
    };

    let circuit_breaker = match get_child_node(node, "circuit-breaker") {
        Some(cb) => parse_circuit_breaker(cb)?,
        None => CircuitBreakerConfig::default(),
    };

    let config = StoreFailureConfig {
        policy,
        max_attempts: get_u32_entry(node, "max-attempts")?.unwrap_or_else(default_max_attempts),
        initial_backoff_ms: get_u64_entry(node, "initial-backoff-ms")?
            .unwrap_or_else(default_initial_backoff_ms),
        max_backoff_ms: get_u64_entry(node, "max-backoff-ms")?
            .unwrap_or_else(default_max_backoff_ms),
        escalate_after: get_u32_entry(node, "escalate-after")?
            .unwrap_or_else(default_escalate_after),
        circuit_breaker,
    };

    trace!(
        policy = %config.policy,
        max_attempts = config.max_attempts,
        escalate_after = config.escalate_after,
        "Parsed store-failure configuration"
    );

    Ok(config)
}

fn parse_circuit_breaker(node: &kdl::KdlNode) -> Result<CircuitBreakerConfig> {
    warn_unknown(
        node,
        &[
            "failure-threshold",
            "success-threshold",
            "timeout-seconds",
            "half-open-max-requests",
        ],
    );

    let defaults = CircuitBreakerConfig::default();
    Ok(CircuitBreakerConfig {
        failure_threshold: get_u32_entry(node, "failure-threshold")?
            .unwrap_or(defaults.failure_threshold),
        success_threshold: get_u32_entry(node, "success-threshold")?
            .unwrap_or(defaults.success_threshold),
        timeout_seconds: get_u64_entry(node, "timeout-seconds")?
            .unwrap_or(defaults.timeout_seconds),
        half_open_max_requests: get_u32_entry(node, "half-open-max-requests")?
            .unwrap_or(defaults.half_open_max_requests),
    })
}

/// Parse the `store { ... }` block
pub fn parse_store_config(node: &kdl::KdlNode) -> Result<StoreConfig> {
    warn_unknown(node, &["inventory"]);

    Ok(StoreConfig {
        inventory: get_string_entry(node, "inventory")?
            .map(Into::into)
            .unwrap_or_else(default_inventory),
    })
}

/// Parse the `issuer { ... }` block
pub fn parse_issuer_config(node: &kdl::KdlNode) -> Result<IssuerConfig> {
    warn_unknown(node, &["endpoint", "auth-token", "dry-run"]);

    let config = IssuerConfig {
        endpoint: get_string_entry(node, "endpoint")?,
        auth_token: get_string_entry(node, "auth-token")?,
        dry_run: get_bool_entry(node, "dry-run")?.unwrap_or(false),
    };

    trace!(
        endpoint = ?config.endpoint,
        dry_run = config.dry_run,
        "Parsed issuer configuration"
    );

    Ok(config)
}
