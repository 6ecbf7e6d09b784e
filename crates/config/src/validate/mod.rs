//! Deep configuration validation
//!
//! Beyond the range checks run on every load, `autorenew --test` inspects
//! the environment the configuration points at: the inventory file, the
//! issuer endpoint, and settings that are legal but risky.

mod inventory;
mod issuer;
mod lint;

pub use inventory::validate_inventory;
pub use issuer::validate_issuer;
pub use lint::lint_config;

use crate::Config;
use std::fmt;

/// Category of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Inventory,
    Issuer,
    Network,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Inventory => write!(f, "inventory"),
            ErrorCategory::Issuer => write!(f, "issuer"),
            ErrorCategory::Network => write!(f, "network"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Collected errors and warnings from one or more validators
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run every deep validator against the configuration
pub async fn validate_all(config: &Config) -> ValidationResult {
    let mut result = lint_config(config);
    result.merge(validate_inventory(config));
    result.merge(validate_issuer(config).await);
    result
}
