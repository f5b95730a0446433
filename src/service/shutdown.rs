//! Shutdown coordination and the periodic-task driver shared by the
//! polling, health and retention loops.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Broadcasts a single shutdown signal to every background loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Creates a coordinator with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribes to the shutdown signal.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Sends the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of loops still listening.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `task` every `period` until the shutdown signal arrives.
///
/// The first run happens immediately. A run that overruns the period
/// delays the next tick instead of bursting. A zero period is treated as
/// disabled and returns at once.
pub async fn every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut task: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    if period.is_zero() {
        tracing::info!(task = name, "periodic task disabled");
        return;
    }
    tracing::info!(task = name, period_secs = period.as_secs(), "periodic task starting");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => task().await,
            _ = shutdown.recv() => {
                tracing::info!(task = name, "periodic task received shutdown signal");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_until_shutdown() {
        let shutdown = Shutdown::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = tokio::spawn(every(
            "test",
            Duration::from_secs(10),
            shutdown.subscribe(),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.trigger();
        assert!(handle.await.is_ok());
        // ticks at 0s, 10s, 20s
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_period_is_disabled() {
        let shutdown = Shutdown::new();
        every("noop", Duration::ZERO, shutdown.subscribe(), || async {}).await;
        assert_eq!(shutdown.receiver_count(), 0);
    }
}
