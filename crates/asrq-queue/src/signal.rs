//! Level-triggered availability signal.

use std::time::Duration;

use tokio::sync::watch;

/// Raised while the queue holds work; every waiter wakes on a raise.
#[derive(Debug)]
pub struct AvailabilitySignal {
    tx: watch::Sender<bool>,
}

impl AvailabilitySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn raise(&self) {
        self.tx.send_if_modified(|v| !std::mem::replace(v, true));
    }

    pub fn lower(&self) {
        self.tx.send_if_modified(|v| std::mem::replace(v, false));
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until raised, for at most `timeout`. Returns the flag state.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|raised| *raised)).await {
            Ok(Ok(_)) => true,
            _ => self.is_raised(),
        }
    }
}

impl Default for AvailabilitySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_raise_lower() {
        let signal = AvailabilitySignal::new();
        assert!(!signal.is_raised());
        signal.raise();
        signal.raise();
        assert!(signal.is_raised());
        signal.lower();
        assert!(!signal.is_raised());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_raised() {
        let signal = AvailabilitySignal::new();
        signal.raise();
        assert!(signal.wait(Duration::from_secs(30)).await);
        assert!(signal.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let signal = AvailabilitySignal::new();
        assert!(!signal.wait(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_raise_wakes_all_waiters() {
        let signal = Arc::new(AvailabilitySignal::new());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let signal = signal.clone();
            handles.push(tokio::spawn(async move {
                signal.wait(Duration::from_secs(10)).await
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.raise();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}
