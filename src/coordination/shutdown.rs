//! Cooperative stop handling
//!
//! A stop request never interrupts an in-flight submission. The runner checks
//! the signal between orders and wakes early from delays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

struct Inner {
    requested: AtomicBool,
    tx: watch::Sender<bool>,
}

/// Cloneable stop handle shared by the signal handlers and the runner
#[derive(Clone)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                tx,
            }),
        }
    }

    /// Request a stop; later requests are ignored
    pub fn request(&self, reason: &str) {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            warn!("Stop already requested, ignoring: {}", reason);
            return;
        }

        info!("Stop requested: {}", reason);
        self.inner.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.inner.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `false` when the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_requested();
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancelled() => false,
        }
    }
}

/// Wire SIGINT (Ctrl+C) and SIGTERM to `stop`
pub fn install_signal_handlers(stop: StopSignal) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name) in [
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::terminate(), "SIGTERM"),
        ] {
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut stream = match signal(kind) {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Failed to install {} handler: {}", name, e);
                        return;
                    }
                };
                while stream.recv().await.is_some() {
                    stop.request(name);
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                stop.request("Ctrl+C");
            }
        });
    }
}
