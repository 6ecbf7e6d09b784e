//! Renewal scanner
//!
//! Waits on a [`WakeChannel`], and on every wake lists the certificate store,
//! picks the certificates that are due and hands each one to the issuer.
//! One cycle finishes completely before the next wake is awaited.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use autorenew_common::{Certificate, CertificateId, CircuitBreaker};
use autorenew_config::{SchedulerConfig, StoreFailureConfig, StoreFailurePolicy};

use crate::error::{IssuerError, SchedulerError, StoreError};
use crate::issuer::Issuer;
use crate::policy::{needs_renewal, renewal_candidates};
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};
use crate::shutdown::ShutdownSignal;
use crate::store::CertificateStore;
use crate::wake::{WakeChannel, WakeSignal};

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The store answered and every candidate was dispatched
    Completed,
    /// The store could not be listed; nothing was dispatched
    StoreUnavailable,
    /// The store breaker is open; the store was not called
    CircuitOpen,
    /// Shutdown arrived while retrying the store
    Interrupted,
    /// A single-certificate renewal named an id the store does not know
    UnknownCertificate,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::StoreUnavailable => "store-unavailable",
            CycleOutcome::CircuitOpen => "circuit-open",
            CycleOutcome::Interrupted => "interrupted",
            CycleOutcome::UnknownCertificate => "unknown-certificate",
        };
        f.write_str(s)
    }
}

/// Summary of one scan cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Certificates returned by the store
    pub total: usize,
    /// Distinct domain names across those certificates
    pub domains: usize,
    /// Certificates selected for renewal
    pub candidates: usize,
    pub renewed: usize,
    pub failed: usize,
}

impl CycleReport {
    fn empty(started_at: DateTime<Utc>, outcome: CycleOutcome) -> Self {
        Self {
            started_at,
            outcome,
            total: 0,
            domains: 0,
            candidates: 0,
            renewed: 0,
            failed: 0,
        }
    }

    fn for_inventory(started_at: DateTime<Utc>, certs: &[Certificate]) -> Self {
        let domains: HashSet<&str> = certs.iter().flat_map(|c| c.all_names()).collect();
        Self {
            total: certs.len(),
            domains: domains.len(),
            ..Self::empty(started_at, CycleOutcome::Completed)
        }
    }

    /// Whether the store was listed successfully
    pub fn is_completed(&self) -> bool {
        self.outcome == CycleOutcome::Completed
    }
}

/// Periodic certificate renewal loop.
///
/// Holds no state between cycles besides the store circuit breaker, so
/// certificates added to or removed from the store are picked up on the
/// next wake.
pub struct RenewalScanner {
    cycle: ScanCycle,
    wake: WakeChannel,
}

/// Everything a single cycle needs; shared by reference while dispatching
struct ScanCycle {
    store: Arc<dyn CertificateStore>,
    issuer: Arc<dyn Issuer>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    failure_policy: StoreFailurePolicy,
    /// Consecutive failed cycles before giving up (0 = never)
    escalate_after: u32,
    store_timeout: Duration,
    renew_timeout: Duration,
    max_concurrent_renewals: Option<usize>,
    run_on_start: bool,
}

impl RenewalScanner {
    /// Create a scanner with default settings
    pub fn new(
        store: Arc<dyn CertificateStore>,
        issuer: Arc<dyn Issuer>,
        wake: WakeChannel,
    ) -> Self {
        Self::from_config(
            &SchedulerConfig::default(),
            &StoreFailureConfig::default(),
            store,
            issuer,
            wake,
        )
    }

    pub fn from_config(
        scheduler: &SchedulerConfig,
        store_failure: &StoreFailureConfig,
        store: Arc<dyn CertificateStore>,
        issuer: Arc<dyn Issuer>,
        wake: WakeChannel,
    ) -> Self {
        let cycle = ScanCycle {
            store,
            issuer,
            breaker: CircuitBreaker::new(
                "certificate-store",
                store_failure.circuit_breaker.clone(),
            ),
            retry: RetryPolicy::from_config(store_failure),
            failure_policy: store_failure.policy,
            escalate_after: store_failure.escalate_after,
            store_timeout: scheduler.store_timeout(),
            renew_timeout: scheduler.renew_timeout(),
            max_concurrent_renewals: scheduler.max_concurrent_renewals,
            run_on_start: scheduler.run_on_start,
        };
        Self { cycle, wake }
    }

    /// Replace the store failure handling (policy, retries, breaker)
    pub fn with_store_failure(mut self, config: &StoreFailureConfig) -> Self {
        self.cycle.breaker =
            CircuitBreaker::new("certificate-store", config.circuit_breaker.clone());
        self.cycle.retry = RetryPolicy::from_config(config);
        self.cycle.failure_policy = config.policy;
        self.cycle.escalate_after = config.escalate_after;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.cycle.store_timeout = timeout;
        self
    }

    pub fn with_renew_timeout(mut self, timeout: Duration) -> Self {
        self.cycle.renew_timeout = timeout;
        self
    }

    /// Cap the number of renewals in flight at once; `None` means no cap
    pub fn with_max_concurrent_renewals(mut self, limit: Option<usize>) -> Self {
        self.cycle.max_concurrent_renewals = limit;
        self
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.cycle.run_on_start = run_on_start;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.cycle.breaker
    }

    /// Run until shutdown is requested or an unrecoverable error occurs.
    ///
    /// Shutdown is only observed while waiting (and during store retry
    /// backoff), so renewals already dispatched are always awaited.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), SchedulerError> {
        let Self { cycle, mut wake } = self;

        info!(
            policy = %cycle.failure_policy,
            store_timeout_secs = cycle.store_timeout.as_secs(),
            renew_timeout_secs = cycle.renew_timeout.as_secs(),
            max_concurrent_renewals = ?cycle.max_concurrent_renewals,
            run_on_start = cycle.run_on_start,
            "Starting certificate renewal scanner"
        );

        if cycle.run_on_start && !shutdown.is_shutdown_requested() {
            cycle.handle(WakeSignal::Tick, &mut shutdown).await?;
        }

        loop {
            let signal = tokio::select! {
                biased;

                _ = shutdown.requested() => {
                    info!("Shutdown requested, stopping renewal scanner");
                    return Ok(());
                }

                signal = wake.next() => match signal {
                    Ok(signal) => signal,
                    Err(e) => {
                        error!(error = %e, "Wake source failed, stopping renewal scanner");
                        return Err(e.into());
                    }
                },
            };

            cycle.handle(signal, &mut shutdown).await?;
        }
    }

    /// Run one full scan cycle now.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        self.cycle.scan(&mut ShutdownSignal::never()).await
    }

    /// Renew one certificate now, regardless of how long it has left.
    pub async fn renew_now(&self, id: &CertificateId) -> Result<CycleReport, SchedulerError> {
        self.cycle
            .renew_single(id, "direct", &mut ShutdownSignal::never())
            .await
    }
}

impl ScanCycle {
    async fn handle(
        &self,
        signal: WakeSignal,
        shutdown: &mut ShutdownSignal,
    ) -> Result<CycleReport, SchedulerError> {
        debug!(signal = %signal, "Woke up");

        let report = match signal {
            WakeSignal::Tick | WakeSignal::ScanNow { .. } => self.scan(shutdown).await?,
            WakeSignal::Renew { id, source } => self.renew_single(&id, &source, shutdown).await?,
        };

        info!(
            outcome = %report.outcome,
            certificates = report.total,
            domains = report.domains,
            candidates = report.candidates,
            renewed = report.renewed,
            failed = report.failed,
            "Scan cycle finished"
        );

        Ok(report)
    }

    async fn scan(&self, shutdown: &mut ShutdownSignal) -> Result<CycleReport, SchedulerError> {
        let started_at = Utc::now();
        info!("Scanning all certificates for renewal");

        let certs = match self.fetch_certs(shutdown).await? {
            Ok(certs) => certs,
            Err(outcome) => return Ok(CycleReport::empty(started_at, outcome)),
        };

        let now = Utc::now();
        let candidates = renewal_candidates(&certs, now);

        let mut report = CycleReport::for_inventory(started_at, &certs);
        report.candidates = candidates.len();

        debug!(
            certificates = certs.len(),
            candidates = candidates.len(),
            "Evaluated renewal policy"
        );

        let (renewed, failed) = self.dispatch(candidates, now).await;
        report.renewed = renewed;
        report.failed = failed;
        Ok(report)
    }

    async fn renew_single(
        &self,
        id: &CertificateId,
        source: &str,
        shutdown: &mut ShutdownSignal,
    ) -> Result<CycleReport, SchedulerError> {
        let started_at = Utc::now();
        info!(cert_id = %id, source = %source, "Manual renewal requested");

        let certs = match self.fetch_certs(shutdown).await? {
            Ok(certs) => certs,
            Err(outcome) => return Ok(CycleReport::empty(started_at, outcome)),
        };

        let mut report = CycleReport::for_inventory(started_at, &certs);
        let Some(cert) = certs.iter().find(|c| &c.id == id) else {
            warn!(cert_id = %id, source = %source, "Manual renewal requested for unknown certificate");
            report.outcome = CycleOutcome::UnknownCertificate;
            return Ok(report);
        };

        let now = Utc::now();
        if !needs_renewal(cert, now) {
            debug!(
                cert_id = %id,
                days_left = cert.days_left(now),
                renew_at = cert.renew_at,
                "Forcing renewal ahead of policy"
            );
        }

        report.candidates = 1;
        let (renewed, failed) = self.dispatch(vec![cert], now).await;
        report.renewed = renewed;
        report.failed = failed;
        Ok(report)
    }

    /// List the store according to the failure policy.
    ///
    /// The outer error stops the scanner; the inner one skips the cycle.
    async fn fetch_certs(
        &self,
        shutdown: &mut ShutdownSignal,
    ) -> Result<Result<Vec<Certificate>, CycleOutcome>, SchedulerError> {
        match self.failure_policy {
            StoreFailurePolicy::Fatal => match self.list_store().await {
                Ok(certs) => Ok(Ok(certs)),
                Err(e) => {
                    error!(error = %e, policy = "fatal", "Certificate store unavailable");
                    Err(SchedulerError::StoreUnavailable {
                        consecutive_failures: 1,
                        source: e,
                    })
                }
            },
            StoreFailurePolicy::Retry => {
                if !self.breaker.is_closed() {
                    warn!(
                        state = %self.breaker.state(),
                        consecutive_failures = self.breaker.consecutive_failures(),
                        "Certificate store circuit open, skipping cycle"
                    );
                    return Ok(Err(CycleOutcome::CircuitOpen));
                }

                match retry_with_backoff(&self.retry, shutdown, || self.list_store()).await {
                    Ok(certs) => {
                        self.breaker.record_success();
                        Ok(Ok(certs))
                    }
                    Err(RetryError::Cancelled { attempts }) => {
                        info!(attempts, "Shutdown during store retry, abandoning cycle");
                        Ok(Err(CycleOutcome::Interrupted))
                    }
                    Err(RetryError::Exhausted { last, attempts }) => {
                        let failures = self.breaker.record_failure();

                        if self.escalate_after > 0 && failures >= u64::from(self.escalate_after) {
                            error!(
                                error = %last,
                                attempts,
                                consecutive_failures = failures,
                                escalate_after = self.escalate_after,
                                "Certificate store still unavailable, giving up"
                            );
                            return Err(SchedulerError::StoreUnavailable {
                                consecutive_failures: failures,
                                source: last,
                            });
                        }

                        warn!(
                            error = %last,
                            attempts,
                            consecutive_failures = failures,
                            "Certificate store unavailable, skipping cycle"
                        );
                        Ok(Err(CycleOutcome::StoreUnavailable))
                    }
                }
            }
        }
    }

    async fn list_store(&self) -> Result<Vec<Certificate>, StoreError> {
        let certs = tokio::time::timeout(self.store_timeout, self.store.all_certs())
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))??;
        trace!(certificates = certs.len(), "Listed certificate store");
        Ok(certs)
    }

    /// Hand every candidate to the issuer; returns (renewed, failed).
    async fn dispatch(&self, candidates: Vec<&Certificate>, now: DateTime<Utc>) -> (usize, usize) {
        if candidates.is_empty() {
            return (0, 0);
        }

        let limit = self
            .max_concurrent_renewals
            .unwrap_or(candidates.len())
            .max(1);

        let renewals: Vec<_> = candidates
            .into_iter()
            .map(|cert| self.renew_one(cert, now))
            .collect();

        let results: Vec<bool> = stream::iter(renewals)
            .buffer_unordered(limit)
            .collect()
            .await;

        let renewed = results.iter().filter(|ok| **ok).count();
        (renewed, results.len() - renewed)
    }

    async fn renew_one(&self, cert: &Certificate, now: DateTime<Utc>) -> bool {
        let days_left = cert.days_left(now);
        info!(
            cert_id = %cert.id,
            common_name = %cert.common_name,
            expiry = %cert.expiry,
            days_left,
            renew_at = cert.renew_at,
            "Renewing certificate"
        );

        let start = Instant::now();
        let result = match tokio::time::timeout(self.renew_timeout, self.issuer.renew(cert)).await
        {
            Ok(result) => result,
            Err(_) => Err(IssuerError::Timeout(self.renew_timeout)),
        };

        match result {
            Ok(()) => {
                info!(
                    cert_id = %cert.id,
                    common_name = %cert.common_name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Renewal dispatched"
                );
                true
            }
            Err(e) => {
                error!(
                    cert_id = %cert.id,
                    common_name = %cert.common_name,
                    expiry = %cert.expiry,
                    at = %Utc::now(),
                    error = %e,
                    "Certificate renewal failed"
                );
                false
            }
        }
    }
}

impl fmt::Debug for RenewalScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cycle = &self.cycle;
        f.debug_struct("RenewalScanner")
            .field("failure_policy", &cycle.failure_policy)
            .field("breaker", &cycle.breaker)
            .field("retry", &cycle.retry)
            .field("escalate_after", &cycle.escalate_after)
            .field("store_timeout", &cycle.store_timeout)
            .field("renew_timeout", &cycle.renew_timeout)
            .field("max_concurrent_renewals", &cycle.max_concurrent_renewals)
            .field("run_on_start", &cycle.run_on_start)
            .field("wake", &self.wake)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, ManualClockHandle};
    use crate::error::ClockError;
    use crate::shutdown::shutdown_channel;
    use crate::store::MemoryStore;
    use crate::wake::TriggerHandle;
    use async_trait::async_trait;
    use autorenew_common::{CircuitBreakerConfig, CircuitBreakerState};
    use chrono::Duration as ChronoDuration;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records renewals; fails or stalls for selected ids
    #[derive(Default)]
    struct RecordingIssuer {
        renewed: Mutex<Vec<CertificateId>>,
        reject: Vec<CertificateId>,
        stall: Vec<CertificateId>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl RecordingIssuer {
        fn rejecting(ids: &[&str]) -> Self {
            Self {
                reject: ids.iter().map(|id| CertificateId::from(*id)).collect(),
                ..Default::default()
            }
        }

        fn stalling(ids: &[&str]) -> Self {
            Self {
                stall: ids.iter().map(|id| CertificateId::from(*id)).collect(),
                ..Default::default()
            }
        }

        fn ids(&self) -> Vec<String> {
            let mut ids: Vec<String> = self
                .renewed
                .lock()
                .iter()
                .map(|id| id.to_string())
                .collect();
            ids.sort();
            ids
        }
    }

    #[async_trait]
    impl Issuer for RecordingIssuer {
        async fn renew(&self, cert: &Certificate) -> Result<(), IssuerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.stall.contains(&cert.id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.renewed.lock().push(cert.id.clone());

            if self.reject.contains(&cert.id) {
                return Err(IssuerError::Rejected("quota exceeded".into()));
            }
            Ok(())
        }
    }

    fn cert_in(id: &str, hours: i64, renew_at: i64) -> Certificate {
        Certificate::new(
            id,
            format!("{}.example.com", id),
            Utc::now() + ChronoDuration::hours(hours),
            renew_at,
        )
    }

    fn failure_config(policy: StoreFailurePolicy, escalate_after: u32) -> StoreFailureConfig {
        StoreFailureConfig {
            policy,
            max_attempts: 2,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
            escalate_after,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 100,
                ..Default::default()
            },
        }
    }

    fn scanner(
        store: &MemoryStore,
        issuer: &Arc<RecordingIssuer>,
    ) -> (RenewalScanner, ManualClockHandle, TriggerHandle) {
        let (clock, clock_handle) = ManualClock::new();
        let (wake, triggers) = WakeChannel::new(clock, 8);
        let scanner = RenewalScanner::new(Arc::new(store.clone()), issuer.clone(), wake)
            .with_store_failure(&failure_config(StoreFailurePolicy::Retry, 3));
        (scanner, clock_handle, triggers)
    }

    #[tokio::test]
    async fn test_cycle_renews_only_due_certificates() {
        let store = MemoryStore::new(vec![
            cert_in("soon", 240, 15),
            cert_in("later", 480, 15),
            cert_in("expired", -48, 30),
        ]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.run_cycle().await.unwrap();

        assert_eq!(issuer.ids(), vec!["expired", "soon"]);
        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.total, 3);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.renewed, 2);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_empty_store_is_noop() {
        let store = MemoryStore::default();
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.run_cycle().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.total, 0);
        assert!(issuer.ids().is_empty());
    }

    #[tokio::test]
    async fn test_issuer_failure_does_not_block_others() {
        let store = MemoryStore::new(vec![
            cert_in("a", 24, 30),
            cert_in("b", 24, 30),
            cert_in("c", 24, 30),
        ]);
        let issuer = Arc::new(RecordingIssuer::rejecting(&["b"]));
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.run_cycle().await.unwrap();

        assert_eq!(issuer.ids(), vec!["a", "b", "c"]);
        assert_eq!(report.renewed, 2);
        assert_eq!(report.failed, 1);
        assert!(report.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_issuer_times_out() {
        let store = MemoryStore::new(vec![cert_in("slow", 24, 30), cert_in("fast", 24, 30)]);
        let issuer = Arc::new(RecordingIssuer::stalling(&["slow"]));
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let scanner = scanner.with_renew_timeout(Duration::from_secs(5));

        let report = scanner.run_cycle().await.unwrap();

        assert_eq!(issuer.ids(), vec!["fast"]);
        assert_eq!(report.renewed, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let certs = (0..6).map(|i| cert_in(&format!("c{}", i), 1, 30)).collect();
        let store = MemoryStore::new(certs);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let scanner = scanner.with_max_concurrent_renewals(Some(2));

        let report = scanner.run_cycle().await.unwrap();

        assert_eq!(report.renewed, 6);
        assert!(issuer.peak_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_counts_distinct_domains() {
        let mut a = cert_in("a", 2000, 30);
        a.domains = vec!["a.example.com".into(), "shared.example.com".into()];
        let mut b = cert_in("b", 2000, 30);
        b.domains = vec!["shared.example.com".into()];
        let store = MemoryStore::new(vec![a, b]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.run_cycle().await.unwrap();

        // a.example.com, shared.example.com, b.example.com
        assert_eq!(report.domains, 3);
        assert_eq!(report.candidates, 0);
    }

    #[tokio::test]
    async fn test_repeated_cycles_are_idempotent() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30), cert_in("b", 2000, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let first = scanner.run_cycle().await.unwrap();
        let second = scanner.run_cycle().await.unwrap();

        assert_eq!(first.candidates, second.candidates);
        assert_eq!(issuer.ids(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_fatal_policy_returns_error() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        store.fail_next(1);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let scanner =
            scanner.with_store_failure(&failure_config(StoreFailurePolicy::Fatal, 0));

        let err = scanner.run_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            SchedulerError::StoreUnavailable {
                consecutive_failures: 1,
                ..
            }
        ));
        assert_eq!(store.listings(), 1);
        assert!(issuer.ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_within_cycle() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        store.fail_next(1);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.run_cycle().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(store.listings(), 2);
        assert_eq!(issuer.ids(), vec!["a"]);
        assert_eq!(scanner.breaker().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_skips_cycle_then_escalates() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        // two attempts per cycle, three cycles
        store.fail_next(6);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let first = scanner.run_cycle().await.unwrap();
        assert_eq!(first.outcome, CycleOutcome::StoreUnavailable);
        let second = scanner.run_cycle().await.unwrap();
        assert_eq!(second.outcome, CycleOutcome::StoreUnavailable);

        let err = scanner.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::StoreUnavailable {
                consecutive_failures: 3,
                ..
            }
        ));
        assert_eq!(store.listings(), 6);
        assert!(issuer.ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_recovery_resets_escalation() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        for _ in 0..5 {
            store.fail_next(2);
            let skipped = scanner.run_cycle().await.unwrap();
            assert_eq!(skipped.outcome, CycleOutcome::StoreUnavailable);

            let ok = scanner.run_cycle().await.unwrap();
            assert!(ok.is_completed());
        }

        assert_eq!(issuer.ids().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skips_store() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        store.fail_next(2);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let mut config = failure_config(StoreFailurePolicy::Retry, 0);
        config.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: 1,
            timeout_seconds: 3600,
            ..Default::default()
        };
        let scanner = scanner.with_store_failure(&config);

        assert_eq!(
            scanner.run_cycle().await.unwrap().outcome,
            CycleOutcome::StoreUnavailable
        );
        assert_eq!(
            scanner.run_cycle().await.unwrap().outcome,
            CycleOutcome::CircuitOpen
        );
        assert_eq!(store.listings(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_store_recovers() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        store.fail_next(2);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let mut config = failure_config(StoreFailurePolicy::Retry, 0);
        config.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            timeout_seconds: 0,
            half_open_max_requests: 1,
        };
        let scanner = scanner.with_store_failure(&config);

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(scanner.run_cycle().await.unwrap().outcome);
        }

        assert_eq!(outcomes[0], CycleOutcome::StoreUnavailable);
        assert!(outcomes[1..].iter().all(|o| *o == CycleOutcome::Completed));
        assert_eq!(scanner.breaker().state(), CircuitBreakerState::Closed);
        assert_eq!(store.listings(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_counts_as_failure() {
        struct HangingStore;

        #[async_trait]
        impl CertificateStore for HangingStore {
            async fn all_certs(&self) -> Result<Vec<Certificate>, StoreError> {
                std::future::pending().await
            }
        }

        let (clock, _handle) = ManualClock::new();
        let (wake, _triggers) = WakeChannel::new(clock, 1);
        let scanner = RenewalScanner::new(
            Arc::new(HangingStore),
            Arc::new(RecordingIssuer::default()),
            wake,
        )
        .with_store_failure(&failure_config(StoreFailurePolicy::Fatal, 0))
        .with_store_timeout(Duration::from_secs(2));

        let err = scanner.run_cycle().await.unwrap_err();
        match err {
            SchedulerError::StoreUnavailable { source, .. } => {
                assert!(matches!(source, StoreError::Timeout(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_renew_now_forces_single_certificate() {
        let store = MemoryStore::new(vec![cert_in("fresh", 2000, 30), cert_in("other", 1, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.renew_now(&"fresh".into()).await.unwrap();

        assert_eq!(issuer.ids(), vec!["fresh"]);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.renewed, 1);
    }

    #[tokio::test]
    async fn test_renew_now_unknown_id() {
        let store = MemoryStore::new(vec![cert_in("a", 1, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);

        let report = scanner.renew_now(&"missing".into()).await.unwrap();

        assert_eq!(report.outcome, CycleOutcome::UnknownCertificate);
        assert!(issuer.ids().is_empty());
    }

    #[tokio::test]
    async fn test_run_scans_on_each_tick_until_shutdown() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, clock, _triggers) = scanner(&store, &issuer);
        let (shutdown, signal) = shutdown_channel();

        let task = tokio::spawn(scanner.run(signal));

        clock.advance();
        clock.advance();
        while store.listings() < 2 {
            tokio::task::yield_now().await;
        }

        shutdown.request_shutdown();
        task.await.unwrap().unwrap();

        assert_eq!(issuer.ids(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_run_returns_fatal_store_error() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        store.fail_next(1);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, clock, _triggers) = scanner(&store, &issuer);
        let scanner = scanner.with_store_failure(&failure_config(StoreFailurePolicy::Fatal, 0));
        let (_shutdown, signal) = shutdown_channel();

        clock.advance();
        let result = scanner.run(signal).await;

        assert!(matches!(result, Err(SchedulerError::StoreUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_when_wake_source_closes() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, clock, triggers) = scanner(&store, &issuer);
        let (_shutdown, signal) = shutdown_channel();

        // The buffered tick is still delivered before the clock reports closed
        clock.advance();
        drop(clock);
        drop(triggers);
        let result = scanner.run(signal).await;

        assert!(matches!(
            result,
            Err(SchedulerError::Clock(ClockError::Closed))
        ));
        assert_eq!(store.listings(), 1);
        assert_eq!(issuer.ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_run_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let store = MemoryStore::default();
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let (_shutdown, signal) = shutdown_channel();

        let run = scanner.run(signal);
        assert_send(&run);
    }

    #[tokio::test]
    async fn test_run_handles_manual_triggers() {
        let store = MemoryStore::new(vec![cert_in("a", 2000, 30), cert_in("b", 1, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, triggers) = scanner(&store, &issuer);
        let (shutdown, signal) = shutdown_channel();

        triggers.renew("a", "api").unwrap();
        triggers.scan_now("api").unwrap();
        let task = tokio::spawn(scanner.run(signal));

        while store.listings() < 2 {
            tokio::task::yield_now().await;
        }
        shutdown.request_shutdown();
        task.await.unwrap().unwrap();

        assert_eq!(issuer.ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_on_start() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, _clock, _triggers) = scanner(&store, &issuer);
        let scanner = scanner.with_run_on_start(true);
        let (shutdown, signal) = shutdown_channel();

        let task = tokio::spawn(scanner.run(signal));
        while store.listings() < 1 {
            tokio::task::yield_now().await;
        }
        shutdown.request_shutdown();
        task.await.unwrap().unwrap();

        assert_eq!(issuer.ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_everything() {
        let store = MemoryStore::new(vec![cert_in("a", 24, 30)]);
        let issuer = Arc::new(RecordingIssuer::default());
        let (scanner, clock, _triggers) = scanner(&store, &issuer);
        let scanner = scanner.with_run_on_start(true);
        let (shutdown, signal) = shutdown_channel();

        clock.advance();
        shutdown.request_shutdown();
        scanner.run(signal).await.unwrap();

        assert_eq!(store.listings(), 0);
    }
}
