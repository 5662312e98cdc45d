//! Cooperative stop signal shared between a sampling loop and whoever owns it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cloneable one-way stop flag.
///
/// The flag goes from running to stopped once and never back. The loop
/// polls [`is_stopped`](Self::is_stopped) between iterations and waits on
/// [`stopped`](Self::stopped) while sleeping.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` for the call that actually flipped the flag.
    pub fn stop(&self) -> bool {
        let first = !self.inner.stopped.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent stop() is not missed
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_is_one_way_and_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());

        assert!(signal.stop());
        assert!(signal.is_stopped());

        assert!(!signal.stop());
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        clone.stop();
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_resolves_immediately_when_already_stopped() {
        let signal = StopSignal::new();
        signal.stop();
        tokio::time::timeout(Duration::from_millis(100), signal.stopped())
            .await
            .expect("stopped() should resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_wakes_waiter() {
        let signal = StopSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.stopped().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
