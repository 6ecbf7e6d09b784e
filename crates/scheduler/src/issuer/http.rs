//! Issuer reached over HTTP
//!
//! Each renewal is a `POST` of the certificate as JSON to the issuance
//! service. Any 2xx answer means the service accepted the renewal; it is
//! then responsible for completing and persisting it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use autorenew_common::{Certificate, CertificateId};

use crate::error::IssuerError;
use crate::issuer::Issuer;

/// Longest response body kept in a rejection message
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewRequest<'a> {
    id: &'a CertificateId,
    common_name: &'a str,
    domains: Vec<&'a str>,
    expiry: DateTime<Utc>,
    requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HttpIssuer {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpIssuer {
    /// Create an issuer for `endpoint`.
    ///
    /// `timeout` bounds each HTTP request; the scanner applies its own
    /// per-renewal timeout on top.
    pub fn new(
        endpoint: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IssuerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("autorenew/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoint = endpoint.into();
        debug!(endpoint = %endpoint, timeout_secs = timeout.as_secs(), "Created HTTP issuer");

        Ok(Self {
            client,
            endpoint,
            auth_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Issuer for HttpIssuer {
    async fn renew(&self, cert: &Certificate) -> Result<(), IssuerError> {
        let body = RenewRequest {
            id: &cert.id,
            common_name: &cert.common_name,
            domains: cert.all_names(),
            expiry: cert.expiry,
            requested_at: Utc::now(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }

        trace!(cert_id = %cert.id, endpoint = %self.endpoint, "Sending renewal request");
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(cert_id = %cert.id, status = status.as_u16(), "Renewal accepted");
            return Ok(());
        }

        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }

        Err(IssuerError::Rejected(if text.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, text)
        }))
    }
}
