//! Scan clock
//!
//! A [`ScanClock`] only answers "when is the next periodic scan due". It
//! knows nothing about certificates, so the cadence can be swapped out
//! (a manual clock in tests, a different interval at runtime) without
//! touching the scanner.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::trace;

use crate::error::ClockError;

/// Source of periodic wake-ups
#[async_trait]
pub trait ScanClock: Send {
    /// Wait until the next scan is due.
    ///
    /// Dropping the returned future before it completes must be harmless:
    /// the wake channel races it against manual triggers.
    async fn tick(&mut self) -> Result<(), ClockError>;
}

/// Fires once per interval, measured from the start of each wait.
///
/// The deadline is armed on the first `tick` after the previous one fired
/// and survives a dropped `tick` future, so manual triggers winning the race
/// do not push the periodic scan back. A long scan cycle still delays the
/// next tick instead of causing a burst of catch-up ticks.
pub struct IntervalClock {
    interval: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl IntervalClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl fmt::Debug for IntervalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalClock")
            .field("interval", &self.interval)
            .field("armed", &self.deadline.is_some())
            .finish()
    }
}

#[async_trait]
impl ScanClock for IntervalClock {
    async fn tick(&mut self) -> Result<(), ClockError> {
        let interval = self.interval;
        let deadline = self.deadline.get_or_insert_with(|| {
            trace!(interval_secs = interval.as_secs(), "Arming next scan");
            Box::pin(tokio::time::sleep(interval))
        });

        deadline.as_mut().await;
        self.deadline = None;
        Ok(())
    }
}

/// Clock advanced by hand through a [`ManualClockHandle`].
///
/// Ticks queue up: three `advance()` calls yield three scans. Once every
/// handle is dropped and the queue is drained, `tick` fails with
/// [`ClockError::Closed`].
#[derive(Debug)]
pub struct ManualClock {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Producer side of a [`ManualClock`]
#[derive(Debug, Clone)]
pub struct ManualClockHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualClock {
    pub fn new() -> (Self, ManualClockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualClockHandle { tx })
    }
}

impl ManualClockHandle {
    /// Make one scan due. Returns `false` if the clock was dropped.
    pub fn advance(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl ScanClock for ManualClock {
    async fn tick(&mut self) -> Result<(), ClockError> {
        self.rx.recv().await.ok_or(ClockError::Closed)
    }
}
