// ── Change bus ──
//
// Level-triggered wake-up for one device's reconciliation loop. Any number
// of `signal()` calls made while the loop is busy collapse into a single
// pending wake-up; the loop then reads the latest intent from the cache.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct ChangeBus {
    armed: AtomicBool,
    notify: Notify,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the device dirty. Never blocks, never fails.
    pub fn signal(&self) {
        if !self.armed.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Wait until the bus is armed, then disarm it.
    ///
    /// Cancel-safe: dropping the future before it completes leaves the
    /// armed flag untouched.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.armed.swap(false, Ordering::AcqRel) {
                return;
            }
            notified.await;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn signals_coalesce_into_one_wakeup() {
        let bus = ChangeBus::new();
        bus.signal();
        bus.signal();
        bus.signal();
        assert!(bus.is_armed());

        bus.wait().await;
        assert!(!bus.is_armed());

        let second = tokio::time::timeout(Duration::from_millis(20), bus.wait()).await;
        assert!(second.is_err(), "no second wake-up expected");
    }

    #[tokio::test]
    async fn signal_wakes_a_parked_waiter() {
        let bus = Arc::new(ChangeBus::new());
        let waiter = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.wait().await })
        };
        tokio::task::yield_now().await;
        bus.signal();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .expect("task joined");
    }
}
