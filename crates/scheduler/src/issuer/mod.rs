//! Issuer collaborators.
//!
//! The issuer owns the certificate-authority side of renewal (orders,
//! challenges, persisting the new certificate). The scheduler hands it one
//! certificate at a time and only cares whether the hand-off worked.

mod dry_run;
mod http;

pub use dry_run::DryRunIssuer;
pub use http::HttpIssuer;

use async_trait::async_trait;

use autorenew_common::Certificate;

use crate::error::IssuerError;

/// Renewal entry point of the issuance service.
///
/// Implementations must be safe to call concurrently: the scanner dispatches
/// every candidate of a cycle at once.
#[async_trait]
pub trait Issuer: Send + Sync {
    async fn renew(&self, cert: &Certificate) -> Result<(), IssuerError>;
}
