//! Issuer that only logs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use autorenew_common::Certificate;

use crate::error::IssuerError;
use crate::issuer::Issuer;

/// Logs every renewal it would have requested
#[derive(Debug, Default)]
pub struct DryRunIssuer {
    requested: AtomicU64,
}

impl DryRunIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renewals seen so far
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Issuer for DryRunIssuer {
    async fn renew(&self, cert: &Certificate) -> Result<(), IssuerError> {
        self.requested.fetch_add(1, Ordering::Relaxed);
        info!(
            cert_id = %cert.id,
            common_name = %cert.common_name,
            expiry = %cert.expiry,
            "Dry run: would renew certificate"
        );
        Ok(())
    }
}
