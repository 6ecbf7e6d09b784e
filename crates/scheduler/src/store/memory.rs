//! In-memory certificate store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use autorenew_common::{Certificate, CertificateId};

use crate::error::StoreError;
use crate::store::CertificateStore;

/// Certificate set held in memory.
///
/// Clones share the same set, so a host (or a test) can keep a handle and
/// change certificates between cycles. A pending failure can be injected to
/// simulate an unavailable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    certs: Arc<RwLock<Vec<Certificate>>>,
    failures_pending: Arc<AtomicU64>,
    listings: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new(certs: Vec<Certificate>) -> Self {
        Self {
            certs: Arc::new(RwLock::new(certs)),
            ..Default::default()
        }
    }

    /// Insert or replace a certificate by id
    pub fn upsert(&self, cert: Certificate) {
        let mut certs = self.certs.write();
        match certs.iter_mut().find(|c| c.id == cert.id) {
            Some(existing) => *existing = cert,
            None => certs.push(cert),
        }
    }

    pub fn remove(&self, id: &CertificateId) -> Option<Certificate> {
        let mut certs = self.certs.write();
        let pos = certs.iter().position(|c| &c.id == id)?;
        Some(certs.remove(pos))
    }

    /// Replace the whole set
    pub fn replace(&self, certs: Vec<Certificate>) {
        *self.certs.write() = certs;
    }

    /// Make the next `count` listings fail
    pub fn fail_next(&self, count: u64) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Number of listing attempts seen so far, failed ones included
    pub fn listings(&self) -> u64 {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.certs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.read().is_empty()
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn all_certs(&self) -> Result<Vec<Certificate>, StoreError> {
        self.listings.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }

        let certs = self.certs.read().clone();
        trace!(count = certs.len(), "Listed certificates from memory");
        Ok(certs)
    }
}
