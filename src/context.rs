//! Cancellable execution context handed to every tool call

use tokio_util::sync::CancellationToken;

/// Per-call context, cancelled when the server shuts down
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Context that is never cancelled unless `cancel()` is called on it
    pub fn detached() -> Self {
        Self::default()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }
}
