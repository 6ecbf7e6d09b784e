//! Autorenew Scheduler Library
//!
//! Keeps TLS certificates renewed ahead of expiry. A [`RenewalScanner`]
//! wakes on a [`ScanClock`] tick or a manual trigger, lists every certificate
//! from a [`CertificateStore`], and hands the ones inside their renewal
//! window to an [`Issuer`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use autorenew_scheduler::{
//!     shutdown_channel, DryRunIssuer, IntervalClock, MemoryStore, RenewalScanner, WakeChannel,
//! };
//!
//! let (wake, triggers) = WakeChannel::new(IntervalClock::default(), 32);
//! let scanner = RenewalScanner::new(
//!     Arc::new(MemoryStore::default()),
//!     Arc::new(DryRunIssuer::new()),
//!     wake,
//! );
//! let (shutdown, signal) = shutdown_channel();
//! scanner.run(signal).await?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod clock;
pub mod error;
pub mod issuer;
pub mod policy;
pub mod retry;
pub mod scanner;
pub mod shutdown;
pub mod signals;
pub mod store;
pub mod wake;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Errors
pub use error::{ClockError, IssuerError, SchedulerError, StoreError, TriggerError};

// Timing and wake-ups
pub use clock::{IntervalClock, ManualClock, ManualClockHandle, ScanClock};
pub use wake::{TriggerHandle, WakeChannel, WakeSignal};
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};

// Renewal decision
pub use policy::{needs_renewal, renewal_candidates};

// Collaborators
pub use issuer::{DryRunIssuer, HttpIssuer, Issuer};
pub use store::{CertificateStore, FileStore, MemoryStore};

// Scanner
pub use retry::RetryPolicy;
pub use scanner::{CycleOutcome, CycleReport, RenewalScanner};

// Re-export the shared model so hosts need a single dependency
pub use autorenew_common::{Certificate, CertificateId};
