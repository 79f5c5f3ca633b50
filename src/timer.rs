// Delay scheduling and the emergency-stop latch

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Completes once at least `duration` has elapsed
pub trait Timer {
    fn after(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Timer backed by the tokio runtime clock
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn after(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// Latched cancellation token shared between the stop topic and the execution loop
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arm after a cancelled run has been handled
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `trigger` has been called
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // Sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
