//! Signal handling for manual scans and shutdown.
//!
//! Bridges OS signals with the scanner: SIGHUP queues an immediate scan,
//! SIGTERM and SIGINT request a graceful shutdown. A repeated SIGTERM or
//! SIGINT exits the process without waiting.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TriggerError;
use crate::shutdown::ShutdownHandle;
use crate::wake::TriggerHandle;

/// Signal type delivered to the scanner side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Scan right away (SIGHUP)
    ScanNow,
    /// Graceful shutdown (SIGTERM/SIGINT)
    Shutdown,
}

/// What the listener does after a signal has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Keep listening
    Continue,
    /// Graceful shutdown has just been requested
    ShutdownRequested,
    /// A shutdown signal arrived while a graceful shutdown was under way
    ForceExit,
}

/// Exit status used when a repeated shutdown signal aborts the process
pub const FORCED_EXIT_CODE: i32 = 130;

/// Apply one received signal.
///
/// The first shutdown signal requests a graceful stop. Any later one means
/// the operator is done waiting for in-flight renewals.
pub fn dispatch_signal(
    signal: SignalType,
    triggers: &TriggerHandle,
    shutdown: &ShutdownHandle,
) -> SignalAction {
    debug!(signal = ?signal, "Received signal");
    match signal {
        SignalType::ScanNow => {
            match triggers.scan_now("sighup") {
                Ok(()) => info!("SIGHUP received, scan queued"),
                Err(TriggerError::Full) => {
                    warn!("SIGHUP received but scans are already queued, ignoring")
                }
                Err(TriggerError::Closed) => warn!("SIGHUP received but scanner has stopped"),
            }
            SignalAction::Continue
        }
        SignalType::Shutdown if shutdown.is_shutdown_requested() => SignalAction::ForceExit,
        SignalType::Shutdown => {
            shutdown.request_shutdown();
            info!("Waiting for in-flight renewals, signal again to exit immediately");
            SignalAction::ShutdownRequested
        }
    }
}

fn force_exit() -> ! {
    warn!(code = FORCED_EXIT_CODE, "Second shutdown signal, exiting without waiting");
    std::process::exit(FORCED_EXIT_CODE)
}

/// Listen for OS signals in a background task.
///
/// The task outlives the first shutdown signal so a second one can still
/// abort the process. Abort the returned handle once the scanner has stopped.
#[cfg(unix)]
pub fn spawn_signal_listener(
    triggers: TriggerHandle,
    shutdown: ShutdownHandle,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = terminate.recv() => SignalType::Shutdown,
                _ = interrupt.recv() => SignalType::Shutdown,
                _ = hangup.recv() => SignalType::ScanNow,
            };

            if dispatch_signal(received, &triggers, &shutdown) == SignalAction::ForceExit {
                force_exit();
            }
        }
    }))
}

/// Listen for Ctrl-C in a background task.
#[cfg(not(unix))]
pub fn spawn_signal_listener(
    triggers: TriggerHandle,
    shutdown: ShutdownHandle,
) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Failed to listen for Ctrl-C, shutdown only via scanner exit");
                std::future::pending::<()>().await;
            }
            if dispatch_signal(SignalType::Shutdown, &triggers, &shutdown)
                == SignalAction::ForceExit
            {
                force_exit();
            }
        }
    }))
}
