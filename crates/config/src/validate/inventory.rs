//! Certificate inventory validation
//!
//! Checks that the inventory file exists and parses, and reports entries the
//! scheduler will treat specially.

use std::collections::HashSet;
use std::fs;

use chrono::Utc;

use autorenew_common::Certificate;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::Config;

/// Validate the certificate inventory file
pub fn validate_inventory(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let path = &config.store.inventory;

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            result.add_error(ValidationError::new(
                ErrorCategory::Inventory,
                format!("Failed to read inventory {:?}: {}", path, e),
            ));
            return result;
        }
    };

    let certs: Vec<Certificate> = match serde_json::from_str(&content) {
        Ok(certs) => certs,
        Err(e) => {
            result.add_error(ValidationError::new(
                ErrorCategory::Inventory,
                format!("Invalid inventory {:?}: {}", path, e),
            ));
            return result;
        }
    };

    let now = Utc::now();
    let mut seen = HashSet::new();

    for cert in &certs {
        if !seen.insert(&cert.id) {
            result.add_error(ValidationError::new(
                ErrorCategory::Inventory,
                format!("Duplicate certificate id '{}' in {:?}", cert.id, path),
            ));
        }

        if cert.renew_at < 0 {
            result.add_warning(ValidationWarning::new(format!(
                "Certificate '{}' ({}) has negative renew-at {}: it will never be renewed \
                 before it expires",
                cert.id, cert.common_name, cert.renew_at
            )));
        }

        if cert.is_expired(now) {
            result.add_warning(ValidationWarning::new(format!(
                "Certificate '{}' ({}) expired at {}",
                cert.id, cert.common_name, cert.expiry
            )));
        }
    }

    if certs.is_empty() {
        result.add_warning(ValidationWarning::new(format!(
            "Inventory {:?} lists no certificates",
            path
        )));
    }

    result
}
