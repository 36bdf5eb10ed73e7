//! One-shot shutdown broadcast shared by the client's background tasks.

use tokio::sync::watch;

/// Creates the sending half (held by client handles) and a receiver
/// that tasks clone.
pub(crate) fn channel() -> (watch::Sender<bool>, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (tx, Shutdown { rx })
}

/// Receiving half of the shutdown signal.
///
/// The signal fires when `true` is sent, or when every sender has been
/// dropped, so tasks can't outlive the last client handle.
#[derive(Debug, Clone)]
pub(crate) struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Resolves once shutdown has been signaled. Returns immediately if
    /// it already has been.
    pub(crate) async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
