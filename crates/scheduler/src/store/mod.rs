//! Certificate store collaborators.
//!
//! The scheduler only needs one thing from storage: the complete, current
//! certificate set. Persistence, imports and updates belong to whatever
//! sits behind this trait.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use autorenew_common::Certificate;

use crate::error::StoreError;

/// Read access to every known certificate
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Return the complete certificate set; no pagination, no partial results.
    async fn all_certs(&self) -> Result<Vec<Certificate>, StoreError>;
}
