//! Wake channel
//!
//! Everything that can start work in the scanner funnels through one
//! [`WakeChannel`]: the periodic [`ScanClock`] and any number of
//! [`TriggerHandle`]s held by other parts of the process (signal handlers,
//! an API, tests). The scanner only ever consumes [`WakeSignal`]s and does
//! not care where they came from.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use autorenew_common::CertificateId;

use crate::clock::ScanClock;
use crate::error::{ClockError, TriggerError};

/// Why the scanner woke up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeSignal {
    /// The scan clock fired
    Tick,
    /// Someone asked for a full scan right away
    ScanNow { source: String },
    /// Someone asked to renew one certificate regardless of policy
    Renew { id: CertificateId, source: String },
}

impl WakeSignal {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            WakeSignal::Tick => "tick",
            WakeSignal::ScanNow { .. } => "scan-now",
            WakeSignal::Renew { .. } => "renew",
        }
    }
}

impl fmt::Display for WakeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeSignal::Tick => write!(f, "scheduled scan"),
            WakeSignal::ScanNow { source } => write!(f, "scan requested by {}", source),
            WakeSignal::Renew { id, source } => {
                write!(f, "renewal of {} requested by {}", id, source)
            }
        }
    }
}

/// Cloneable producer side of the wake channel
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<WakeSignal>,
}

impl TriggerHandle {
    /// Request a full scan, without waiting for queue space
    pub fn scan_now(&self, source: impl Into<String>) -> Result<(), TriggerError> {
        self.try_send(WakeSignal::ScanNow {
            source: source.into(),
        })
    }

    /// Request renewal of a single certificate, without waiting for queue space
    pub fn renew(
        &self,
        id: impl Into<CertificateId>,
        source: impl Into<String>,
    ) -> Result<(), TriggerError> {
        self.try_send(WakeSignal::Renew {
            id: id.into(),
            source: source.into(),
        })
    }

    /// Queue a signal, waiting for space if the queue is full
    pub async fn send(&self, signal: WakeSignal) -> Result<(), TriggerError> {
        trace!(signal = %signal, "Queueing wake signal");
        self.tx.send(signal).await.map_err(|_| TriggerError::Closed)
    }

    fn try_send(&self, signal: WakeSignal) -> Result<(), TriggerError> {
        trace!(signal = %signal, "Queueing wake signal");
        self.tx.try_send(signal).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TriggerError::Full,
            mpsc::error::TrySendError::Closed(_) => TriggerError::Closed,
        })
    }

    /// Whether the scanner side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single consumer of clock ticks and manual triggers
pub struct WakeChannel {
    clock: Box<dyn ScanClock>,
    rx: mpsc::Receiver<WakeSignal>,
    triggers_open: bool,
}

impl WakeChannel {
    /// Create a wake channel around `clock` with room for `capacity`
    /// pending manual triggers.
    pub fn new(clock: impl ScanClock + 'static, capacity: usize) -> (Self, TriggerHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        debug!(capacity = capacity.max(1), "Created wake channel");
        (
            Self {
                clock: Box::new(clock),
                rx,
                triggers_open: true,
            },
            TriggerHandle { tx },
        )
    }

    /// Wait for the next reason to wake.
    ///
    /// Pending triggers win over a clock tick that is due at the same time.
    /// When every [`TriggerHandle`] is dropped the channel keeps running on
    /// the clock alone; a failing clock is returned as an error.
    pub async fn next(&mut self) -> Result<WakeSignal, ClockError> {
        loop {
            if !self.triggers_open {
                self.clock.tick().await?;
                return Ok(WakeSignal::Tick);
            }

            tokio::select! {
                biased;

                signal = self.rx.recv() => match signal {
                    Some(signal) => return Ok(signal),
                    None => {
                        debug!("All trigger handles dropped, continuing on clock ticks only");
                        self.triggers_open = false;
                    }
                },

                result = self.clock.tick() => {
                    result?;
                    return Ok(WakeSignal::Tick);
                }
            }
        }
    }
}

impl fmt::Debug for WakeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeChannel")
            .field("triggers_open", &self.triggers_open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{IntervalClock, ManualClock};
    use std::time::Duration;

    #[tokio::test]
    async fn test_clock_tick_becomes_tick_signal() {
        let (clock, handle) = ManualClock::new();
        let (mut wake, _triggers) = WakeChannel::new(clock, 4);

        handle.advance();
        assert_eq!(wake.next().await.unwrap(), WakeSignal::Tick);
    }

    #[tokio::test]
    async fn test_triggers_from_many_producers() {
        let (clock, _handle) = ManualClock::new();
        let (mut wake, triggers) = WakeChannel::new(clock, 4);
        let api = triggers.clone();

        triggers.scan_now("sighup").unwrap();
        api.renew("cert-7", "api").unwrap();

        assert_eq!(
            wake.next().await.unwrap(),
            WakeSignal::ScanNow {
                source: "sighup".into()
            }
        );
        assert_eq!(
            wake.next().await.unwrap(),
            WakeSignal::Renew {
                id: "cert-7".into(),
                source: "api".into()
            }
        );
    }

    #[tokio::test]
    async fn test_trigger_wins_over_due_tick() {
        let (clock, handle) = ManualClock::new();
        let (mut wake, triggers) = WakeChannel::new(clock, 4);

        handle.advance();
        triggers.scan_now("api").unwrap();

        assert_eq!(wake.next().await.unwrap().kind(), "scan-now");
        assert_eq!(wake.next().await.unwrap(), WakeSignal::Tick);
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        let (clock, _handle) = ManualClock::new();
        let (_wake, triggers) = WakeChannel::new(clock, 1);

        triggers.scan_now("a").unwrap();
        assert_eq!(triggers.scan_now("b"), Err(TriggerError::Full));
    }

    #[tokio::test]
    async fn test_trigger_after_channel_dropped() {
        let (clock, _handle) = ManualClock::new();
        let (wake, triggers) = WakeChannel::new(clock, 1);
        drop(wake);

        assert!(triggers.is_closed());
        assert_eq!(triggers.scan_now("a"), Err(TriggerError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_ticking_without_trigger_handles() {
        let (mut wake, triggers) = WakeChannel::new(IntervalClock::new(Duration::from_secs(5)), 1);
        drop(triggers);

        assert_eq!(wake.next().await.unwrap(), WakeSignal::Tick);
        assert_eq!(wake.next().await.unwrap(), WakeSignal::Tick);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frequent_triggers_do_not_starve_ticks() {
        let (mut wake, triggers) =
            WakeChannel::new(IntervalClock::new(Duration::from_secs(3600)), 4);

        let api = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1800)).await;
                if triggers.renew("cert-1", "api").is_err() {
                    break;
                }
            }
        });

        let start = tokio::time::Instant::now();
        let mut ticks = 0;
        let mut renews = 0;
        while start.elapsed() < Duration::from_secs(6 * 3600) {
            match wake.next().await.unwrap() {
                WakeSignal::Tick => ticks += 1,
                _ => renews += 1,
            }
        }
        api.abort();

        assert!(ticks >= 5, "only {} ticks in six hours", ticks);
        assert!(renews >= 10);
    }

    #[tokio::test]
    async fn test_clock_failure_surfaces() {
        let (clock, handle) = ManualClock::new();
        let (mut wake, triggers) = WakeChannel::new(clock, 1);
        drop(handle);
        drop(triggers);

        assert!(matches!(wake.next().await, Err(ClockError::Closed)));
    }
}
