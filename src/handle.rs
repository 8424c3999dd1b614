//! Handle on a spawned background listener

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running listener task plus its stop flag
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { cancel, task }
    }

    /// Ask the listener to stop at its next loop boundary
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the listener and wait for its task to return
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Listener task ended abnormally: {}", e);
        }
    }
}
