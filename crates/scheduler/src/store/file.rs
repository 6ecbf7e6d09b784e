//! Certificate store backed by a JSON inventory file
//!
//! The inventory is a JSON array of certificates, maintained by whatever
//! issues or imports them:
//!
//! ```json
//! [
//!   {
//!     "id": "3f2a9c",
//!     "commonName": "example.com",
//!     "domains": ["example.com", "www.example.com"],
//!     "expiry": "2026-12-01T00:00:00Z",
//!     "renewAt": 30
//!   }
//! ]
//! ```
//!
//! The file is re-read on every listing so each cycle sees the current set.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, trace};

use autorenew_common::Certificate;

use crate::error::StoreError;
use crate::store::CertificateStore;

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CertificateStore for FileStore {
    async fn all_certs(&self) -> Result<Vec<Certificate>, StoreError> {
        trace!(path = %self.path.display(), "Reading certificate inventory");

        let content = tokio::fs::read(&self.path).await?;
        let certs: Vec<Certificate> = serde_json::from_slice(&content)?;

        debug!(
            path = %self.path.display(),
            count = certs.len(),
            "Loaded certificate inventory"
        );
        Ok(certs)
    }
}
