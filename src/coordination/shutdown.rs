//! Graceful Shutdown Handler
//!
//! A single controller raises shutdown once; any number of listeners can
//! poll it between units of work or await it inside `select!`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Normal graceful shutdown (SIGTERM, SIGINT)
    Graceful,
    /// Requested through the API or by an embedding program
    Requested,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Requested => write!(f, "requested"),
        }
    }
}

/// Owner side of the shutdown signal
pub struct ShutdownController {
    requested: AtomicBool,
    tx: watch::Sender<Option<ShutdownSignal>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            requested: AtomicBool::new(false),
            tx,
        }
    }

    /// Get a listener for the loop or a server
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown; duplicate requests are ignored
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if self.requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal: {}", signal);
            return;
        }

        info!("Shutdown requested: {}", signal);
        self.tx.send_replace(Some(signal));
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of the shutdown signal
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownListener {
    pub fn is_shutdown(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolve once shutdown is requested (or the controller is dropped)
    pub async fn wait(&mut self) -> ShutdownSignal {
        loop {
            if let Some(signal) = *self.rx.borrow_and_update() {
                return signal;
            }
            if self.rx.changed().await.is_err() {
                return ShutdownSignal::Requested;
            }
        }
    }
}

/// Helper to install OS signal handlers
pub fn install_signal_handlers(shutdown: Arc<ShutdownController>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let shutdown_sigterm = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("Received SIGTERM");
                    shutdown_sigterm.request_shutdown(ShutdownSignal::Graceful);
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        });
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                shutdown.request_shutdown(ShutdownSignal::Graceful);
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });
}
