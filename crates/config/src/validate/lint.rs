//! Configuration linting
//!
//! Flags settings that load fine but change how the scheduler behaves in
//! ways an operator may not expect.

use super::{ValidationResult, ValidationWarning};
use crate::{Config, StoreFailurePolicy};

/// Lint configuration for risky settings
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.store_failure.policy == StoreFailurePolicy::Fatal {
        result.add_warning(ValidationWarning::new(
            "Store failure policy is 'fatal': a single failed listing stops the scheduler",
        ));
    }

    if config.store_failure.policy == StoreFailurePolicy::Retry
        && config.store_failure.escalate_after == 0
    {
        result.add_warning(ValidationWarning::new(
            "escalate-after is 0: the scheduler keeps running even if the store never recovers",
        ));
    }

    if !config.issuer.is_live() {
        result.add_warning(ValidationWarning::new(
            "No live issuer configured (dry-run or missing endpoint): renewals are only logged",
        ));
    }

    if config.scheduler.renew_timeout_secs >= config.scheduler.scan_interval_secs {
        result.add_warning(ValidationWarning::new(format!(
            "renew-timeout-secs ({}) is not shorter than scan-interval-secs ({}): \
             a slow issuer can stretch cycles past the scan interval",
            config.scheduler.renew_timeout_secs, config.scheduler.scan_interval_secs
        )));
    }

    result
}
