//! Cooperative cancellation.
//!
//! Built on `tokio::sync::watch` rather than pulling in `tokio-util`, since
//! a one-shot "has this been cancelled" signal is all `KernelContext` needs.

use tokio::sync::watch;

/// Producer half: call `cancel()` to signal every clone of the paired
/// `CancellationToken`.
#[derive(Debug, Clone)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

/// Consumer half, cloned into every `KernelContext`.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationSource {
    pub fn new() -> (Self, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancellationToken { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled. Awaited operations should race
    /// this against their own work and reject with `Cancelled` promptly.
    pub async fn cancelled(&mut self) {
        // A receiver that starts at `false` and is dropped by the sender
        // without ever flipping true would error here; that only happens if
        // the source is dropped, in which case there is nothing left to
        // cancel for, so treat it as an immediate return.
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new().0
    }
}
