//! Renewal decision
//!
//! A certificate is a renewal candidate at `now` when its remaining validity,
//! in whole days rounded down, is strictly below its own `renew_at` lead
//! time. Expired certificates have negative days left and so qualify for any
//! non-negative lead time. `renew_at` is taken as-is: zero renews only
//! expired certificates, negative values never trigger.

use chrono::{DateTime, Utc};

use autorenew_common::Certificate;

/// Whether `cert` should be renewed at `now`
#[inline]
pub fn needs_renewal(cert: &Certificate, now: DateTime<Utc>) -> bool {
    cert.days_left(now) < cert.renew_at
}

/// Certificates from `certs` that qualify for renewal at `now`
pub fn renewal_candidates(certs: &[Certificate], now: DateTime<Utc>) -> Vec<&Certificate> {
    certs.iter().filter(|cert| needs_renewal(cert, now)).collect()
}
