//! autorenew Common
//!
//! Shared building blocks for the autorenew crates:
//!
//! - [`Certificate`] - the read-only certificate view the scheduler evaluates
//! - [`CertificateId`] - type-safe certificate identifier
//! - [`CircuitBreaker`] - lock-free breaker guarding the certificate store

pub mod certificate;
pub mod circuit_breaker;
pub mod ids;
pub mod types;

pub use certificate::Certificate;
pub use circuit_breaker::CircuitBreaker;
pub use ids::CertificateId;
pub use types::{CircuitBreakerConfig, CircuitBreakerState};
