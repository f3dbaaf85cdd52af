use std::time::Duration;
use tokio::sync::watch;

/// Owning side of a stop signal shared by a background task and its controller.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

/// Task side of a [`ShutdownSignal`]. A dropped signal counts as shutdown.
#[derive(Clone, Debug)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        ShutdownSignal { tx }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener { rx: self.tx.subscribe() }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleeps for `duration` unless shutdown arrives first.
    /// Returns `false` when the sleep was interrupted.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.wait() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_trigger() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listener();

        let sleeper = tokio::spawn(async move { listener.sleep(Duration::from_secs(3600)).await });
        tokio::task::yield_now().await;
        signal.trigger();

        assert!(!sleeper.await.unwrap());
        assert!(signal.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_trigger() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listener();

        assert!(listener.sleep(Duration::from_secs(5)).await);
        assert!(!listener.is_shutdown());
    }

    #[tokio::test]
    async fn test_dropped_signal_counts_as_shutdown() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listener();
        drop(signal);

        listener.wait().await;
    }
}
