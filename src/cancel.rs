//! Caller-driven cancellation for in-flight requests.

use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation handle shared between the caller and a running request.
///
/// Clones observe the same state: cancelling any clone cancels them all.
/// Once cancelled, a handle stays cancelled.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    notify: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            notify: Arc::new(tx),
        }
    }

    /// Cancel every request observing this handle.
    pub fn cancel(&self) {
        self.notify.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.notify.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.notify.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // The sender lives in `self`, so this only happens on teardown.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::CancelHandle;

    #[test]
    fn clones_share_state() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let handle = CancelHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter must observe cancellation")
            .expect("waiter task must not panic");
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let handle = CancelHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(50), handle.cancelled())
            .await
            .expect("already-cancelled handle must resolve");
    }
}
