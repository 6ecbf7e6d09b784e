//! Circuit breaker guarding calls to the certificate store
//!
//! A store that keeps failing should not be hammered every cycle, and should
//! not take the scheduler down on the first hiccup either. The breaker counts
//! consecutive failed cycles; once open, cycles skip the store until the
//! cooldown elapses and a half-open trial request is allowed through.
//!
//! All operations are lock-free and complete in constant time.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::types::{CircuitBreakerConfig, CircuitBreakerState};

// State constants for AtomicU8
const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Circuit breaker with three states:
/// - **Closed**: store calls pass through
/// - **Open**: failure threshold reached, store calls are skipped
/// - **Half-Open**: cooldown elapsed, a limited number of trial requests allowed
///
/// ```ignore
/// let breaker = CircuitBreaker::new("certificate-store", CircuitBreakerConfig::default());
///
/// if breaker.is_closed() {
///     match store.all_certs().await {
///         Ok(_) => breaker.record_success(),
///         Err(_) => breaker.record_failure(),
///     }
/// }
/// ```
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    /// Current state (0=Closed, 1=Open, 2=HalfOpen)
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    consecutive_successes: AtomicU64,
    /// Base instant for time calculations
    base_instant: Instant,
    /// Nanoseconds since base_instant when state last changed
    last_state_change_ns: AtomicU64,
    half_open_requests: AtomicU64,
    /// Name of the guarded collaborator, for logging
    name: String,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named collaborator
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();

        debug!(
            name = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            timeout_seconds = config.timeout_seconds,
            half_open_max_requests = config.half_open_max_requests,
            "Creating circuit breaker"
        );

        Self {
            config,
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU64::new(0),
            consecutive_successes: AtomicU64::new(0),
            base_instant: Instant::now(),
            last_state_change_ns: AtomicU64::new(0),
            half_open_requests: AtomicU64::new(0),
            name,
        }
    }

    /// Check whether a call may go through.
    ///
    /// Transitions from Open to HalfOpen once the cooldown has elapsed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED => true,
            STATE_OPEN => {
                let elapsed = self.time_in_state();
                if elapsed >= self.cooldown() {
                    trace!(
                        name = %self.name,
                        elapsed_secs = elapsed.as_secs(),
                        "Cooldown reached, transitioning to half-open"
                    );
                    self.transition_to_half_open();
                    // The trial request itself counts against the half-open budget
                    self.half_open_requests.fetch_add(1, Ordering::Relaxed);
                    true
                } else {
                    trace!(
                        name = %self.name,
                        remaining_secs = self.cooldown().saturating_sub(elapsed).as_secs(),
                        "Circuit open, call blocked"
                    );
                    false
                }
            }
            STATE_HALF_OPEN => {
                let current = self.half_open_requests.fetch_add(1, Ordering::Relaxed);
                let allowed = current < u64::from(self.config.half_open_max_requests);
                trace!(
                    name = %self.name,
                    trial = current + 1,
                    max_trials = self.config.half_open_max_requests,
                    allowed = allowed,
                    "Circuit half-open check"
                );
                allowed
            }
            _ => true,
        }
    }

    /// Record a successful call.
    ///
    /// Resets the failure counter; closes a half-open circuit once the
    /// success threshold is reached. Below the threshold the trial slot is
    /// handed back so the next call can try again.
    #[inline]
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;

        trace!(
            name = %self.name,
            consecutive_successes = successes,
            "Recorded success"
        );

        if self.state.load(Ordering::Acquire) == STATE_HALF_OPEN {
            if successes >= u64::from(self.config.success_threshold) {
                self.transition_to_closed();
            } else {
                // A finished trial frees its slot for the next one
                let _ = self.half_open_requests.fetch_update(
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                    |n| Some(n.saturating_sub(1)),
                );
            }
        }
    }

    /// Record a failed call, returning the new consecutive failure count.
    ///
    /// Opens the circuit when the failure threshold is reached, or
    /// immediately when a half-open trial request fails.
    #[inline]
    pub fn record_failure(&self) -> u64 {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        trace!(
            name = %self.name,
            consecutive_failures = failures,
            failure_threshold = self.config.failure_threshold,
            "Recorded failure"
        );

        match self.state.load(Ordering::Acquire) {
            STATE_CLOSED if failures >= u64::from(self.config.failure_threshold) => {
                self.transition_to_open();
            }
            STATE_HALF_OPEN => {
                debug!(name = %self.name, "Trial request failed in half-open state, re-opening circuit");
                self.transition_to_open();
            }
            _ => {}
        }

        failures
    }

    /// Current state, without triggering the Open to HalfOpen transition
    #[inline]
    pub fn state(&self) -> CircuitBreakerState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => CircuitBreakerState::Open,
            STATE_HALF_OPEN => CircuitBreakerState::HalfOpen,
            _ => CircuitBreakerState::Closed,
        }
    }

    #[inline]
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn consecutive_successes(&self) -> u64 {
        self.consecutive_successes.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reset to closed state
    pub fn reset(&self) {
        self.state.store(STATE_CLOSED, Ordering::Release);
        self.mark_state_change();
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.half_open_requests.store(0, Ordering::Relaxed);

        info!(name = %self.name, "Circuit breaker reset");
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    fn time_in_state(&self) -> Duration {
        let last_change_ns = self.last_state_change_ns.load(Ordering::Acquire);
        let current_ns = self.base_instant.elapsed().as_nanos() as u64;
        Duration::from_nanos(current_ns.saturating_sub(last_change_ns))
    }

    fn mark_state_change(&self) {
        self.last_state_change_ns.store(
            self.base_instant.elapsed().as_nanos() as u64,
            Ordering::Release,
        );
    }

    // ========================================================================
    // State Transitions
    // ========================================================================

    fn transition_to_open(&self) {
        let current = self.state.load(Ordering::Acquire);
        if current == STATE_OPEN {
            return;
        }

        if self
            .state
            .compare_exchange(current, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.mark_state_change();
            warn!(
                name = %self.name,
                consecutive_failures = self.consecutive_failures(),
                cooldown_secs = self.config.timeout_seconds,
                "Circuit breaker opened"
            );
        }
    }

    fn transition_to_closed(&self) {
        let current = self.state.load(Ordering::Acquire);
        if current == STATE_CLOSED {
            return;
        }

        if self
            .state
            .compare_exchange(current, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.mark_state_change();
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            self.half_open_requests.store(0, Ordering::Relaxed);
            info!(name = %self.name, "Circuit breaker closed");
        }
    }

    fn transition_to_half_open(&self) {
        if self
            .state
            .compare_exchange(
                STATE_OPEN,
                STATE_HALF_OPEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.mark_state_change();
            self.half_open_requests.store(0, Ordering::Relaxed);
            info!(name = %self.name, "Circuit breaker half-open");
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}
