//! Type-safe identifier newtypes.
//!
//! Keeps certificate identifiers from being confused with common names or
//! other free-form strings flowing through the scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Certificate identifier.
///
/// Assigned by the certificate store when a certificate is created or
/// imported. The scheduler only ever compares and logs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(String);

impl CertificateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CertificateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CertificateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CertificateId::generate();
        let b = CertificateId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CertificateId::new("cert-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cert-1\"");

        let parsed: CertificateId = serde_json::from_str("\"cert-2\"").unwrap();
        assert_eq!(parsed.as_str(), "cert-2");
    }
}
