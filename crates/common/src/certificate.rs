//! Certificate view consumed by the renewal scheduler.
//!
//! The certificate store owns certificates; everything here is a read-only
//! snapshot taken once per scan cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CertificateId;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// A TLS certificate with its renewal policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Store-assigned identifier
    pub id: CertificateId,
    /// Primary domain
    pub common_name: String,
    /// Subject alternative names (may repeat the common name)
    #[serde(default)]
    pub domains: Vec<String>,
    /// When the certificate stops being valid
    pub expiry: DateTime<Utc>,
    /// Renew once fewer than this many whole days remain
    pub renew_at: i64,
}

impl Certificate {
    pub fn new(
        id: impl Into<CertificateId>,
        common_name: impl Into<String>,
        expiry: DateTime<Utc>,
        renew_at: i64,
    ) -> Self {
        let common_name = common_name.into();
        Self {
            id: id.into(),
            domains: vec![common_name.clone()],
            common_name,
            expiry,
            renew_at,
        }
    }

    /// Whole days of validity left at `now`, rounded towards negative infinity.
    ///
    /// Already-expired certificates yield negative values: twelve hours past
    /// expiry is day -1, not day 0.
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        (self.expiry - now)
            .num_milliseconds()
            .div_euclid(MILLIS_PER_DAY)
    }

    /// Whether the certificate has already expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Every name covered by the certificate, common name first, without duplicates
    pub fn all_names(&self) -> Vec<&str> {
        let mut names = vec![self.common_name.as_str()];
        for domain in &self.domains {
            if !names.contains(&domain.as_str()) {
                names.push(domain);
            }
        }
        names
    }
}
