//! Shutdown signalling.
//!
//! A [`ShutdownHandle`] is held by whoever decides the process should stop
//! (the OS signal bridge in the binary, a test). The scanner holds a
//! [`ShutdownSignal`] and only looks at it while waiting, so an in-flight
//! cycle always finishes dispatching before the scanner returns.

use tokio::sync::watch;
use tracing::info;

/// Controls shutdown of one or more scanners
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Observes a [`ShutdownHandle`]
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle and signal
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    /// Ask every observer to stop. Idempotent.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown_requested() {
            info!(observers = self.tx.receiver_count(), "Shutdown requested");
        }
        self.tx.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Another signal observing this handle
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested.
    ///
    /// If the handle is dropped without requesting shutdown this never
    /// resolves.
    pub async fn requested(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
