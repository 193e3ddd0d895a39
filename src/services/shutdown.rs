//! Process shutdown: OS signals, the cancellation channel seen by the ingest
//! loop, and exit codes.

use tokio::signal;
use tokio::sync::watch;

/// Exit code after an idle timeout or a clean end of input.
pub const EXIT_OK: i32 = 0;
/// Exit code for unrecoverable startup or transport failures.
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_SIGINT: i32 = 130;
pub const EXIT_SIGTERM: i32 = 143;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Interrupt => EXIT_SIGINT,
            Self::Terminate => EXIT_SIGTERM,
        }
    }
}

/// Create a connected trigger/listener pair.
pub fn channel() -> (ShutdownTrigger, ShutdownListener) {
    let (tx, rx) = watch::channel(None);
    (ShutdownTrigger { tx }, ShutdownListener { rx })
}

/// Sending half: flips the process into the shutting-down state.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<Option<ShutdownSignal>>,
}

impl ShutdownTrigger {
    /// Request shutdown. The first signal wins; later ones are ignored.
    pub fn trigger(&self, signal: ShutdownSignal) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(signal);
            true
        });
    }
}

/// Receiving half, awaited next to message arrival and the idle timer.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownListener {
    /// Resolve once shutdown has been requested. Never resolves if every
    /// trigger is dropped without firing. Cancel safe.
    pub async fn recv(&mut self) -> ShutdownSignal {
        loop {
            if let Some(signal) = *self.rx.borrow_and_update() {
                return signal;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM and fire the trigger.
pub async fn listen_for_signals(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::Interrupt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGINT");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                ShutdownSignal::Terminate
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownSignal>();

    let received = tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    };

    tracing::info!(signal = %received, "Shutdown signal received, shutting down gracefully");
    trigger.trigger(received);
}
