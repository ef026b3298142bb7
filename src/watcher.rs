use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{ interval, Duration };
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::services::reconciliation_service::{ ReconcileOutcome, ReconciliationService };

/// Re-checks one payment on a fixed interval while the subscribe session is
/// open. The scheduled sweep remains the authority; this only shortens the
/// wait.
pub struct PaymentWatcher {
    token: CancellationToken,
    handle: JoinHandle<Option<ReconcileOutcome>>,
}

impl PaymentWatcher {
    pub fn spawn(
        service: Arc<ReconciliationService>,
        hash: String,
        every: Duration,
        lifetime: Duration,
        token: CancellationToken
    ) -> Self {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            Self::run(service, hash, every, lifetime, task_token).await
        });

        Self { token, handle }
    }

    async fn run(
        service: Arc<ReconciliationService>,
        hash: String,
        every: Duration,
        lifetime: Duration,
        token: CancellationToken
    ) -> Option<ReconcileOutcome> {
        let deadline = tokio::time::sleep(lifetime);
        tokio::pin!(deadline);
        let mut ticker = interval(every);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(tx_hash = %hash, "Payment watcher cancelled");
                    return None;
                }
                _ = &mut deadline => {
                    tracing::debug!(tx_hash = %hash, "Payment watcher expired, leaving it to the sweep");
                    return None;
                }
                _ = ticker.tick() => {}
            }

            match service.reconcile(&hash).await {
                Ok(outcome) if outcome.is_resolved() => {
                    return Some(outcome);
                }
                Ok(_) => {}
                // Cleaned up underneath us
                Err(AppError::NotFound(_)) => {
                    return None;
                }
                Err(e) => tracing::warn!(tx_hash = %hash, "Payment check failed: {}", e),
            }
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the task. `None` if it stopped without a resolution.
    pub async fn join(self) -> Option<ReconcileOutcome> {
        self.handle.await.ok().flatten()
    }
}

/// Live watchers by transaction hash. Watching a hash again replaces the
/// previous watcher.
pub struct WatcherRegistry {
    service: Arc<ReconciliationService>,
    every: Duration,
    lifetime: Duration,
    root: CancellationToken,
    watchers: Mutex<HashMap<String, PaymentWatcher>>,
}

impl WatcherRegistry {
    pub fn new(
        service: Arc<ReconciliationService>,
        every: Duration,
        lifetime: Duration,
        root: CancellationToken
    ) -> Self {
        Self {
            service,
            every,
            lifetime,
            root,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn watch(&self, hash: &str) {
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|_, w| !w.is_finished());

        if let Some(previous) = watchers.remove(hash) {
            previous.cancel();
        }

        let watcher = PaymentWatcher::spawn(
            self.service.clone(),
            hash.to_string(),
            self.every,
            self.lifetime,
            self.root.child_token()
        );
        watchers.insert(hash.to_string(), watcher);
    }

    /// Stops the watcher for `hash`. Returns whether one was running.
    pub async fn cancel(&self, hash: &str) -> bool {
        match self.watchers.lock().await.remove(hash) {
            Some(watcher) => {
                let running = !watcher.is_finished();
                watcher.cancel();
                running
            }
            None => false,
        }
    }

    pub async fn active(&self) -> usize {
        self.watchers
            .lock().await
            .values()
            .filter(|w| !w.is_finished())
            .count()
    }

    pub fn shutdown(&self) {
        self.root.cancel();
    }
}
