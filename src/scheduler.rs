use crate::config::JobIntervals;
use crate::services::reconciliation_service::ReconciliationService;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{ interval, Duration, MissedTickBehavior };
use tokio_util::sync::CancellationToken;

/// The server-side jobs: pending sweep, expiry sweep and stale cleanup.
/// Each runs on its own interval and stops when the token is cancelled.
pub struct Scheduler {
    service: Arc<ReconciliationService>,
    intervals: JobIntervals,
    token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        service: Arc<ReconciliationService>,
        intervals: JobIntervals,
        token: CancellationToken
    ) -> Self {
        Self {
            service,
            intervals,
            token,
        }
    }

    pub fn start(self) -> Vec<JoinHandle<()>> {
        let pending = self.service.clone();
        let expired = self.service.clone();
        let stale = self.service.clone();

        vec![
            tokio::spawn(
                run_every("pending-sweep", self.intervals.pending_sweep, self.token.child_token(), move || {
                    let service = pending.clone();
                    async move {
                        match service.sweep_pending().await {
                            Ok(report) if report.checked > 0 => {
                                tracing::info!(
                                    checked = report.checked,
                                    completed = report.completed,
                                    failed = report.failed,
                                    still_pending = report.still_pending,
                                    errors = report.errors,
                                    "Pending transaction sweep finished"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!("Pending transaction sweep failed: {}", e),
                        }
                    }
                })
            ),
            tokio::spawn(
                run_every("expiry-sweep", self.intervals.expiry_sweep, self.token.child_token(), move || {
                    let service = expired.clone();
                    async move {
                        match service.sweep_expired().await {
                            Ok(revoked) => tracing::info!(revoked, "Expired subscription sweep finished"),
                            Err(e) => tracing::error!("Expired subscription sweep failed: {}", e),
                        }
                    }
                })
            ),
            tokio::spawn(
                run_every("stale-cleanup", self.intervals.cleanup_sweep, self.token.child_token(), move || {
                    let service = stale.clone();
                    async move {
                        if let Err(e) = service.cleanup_stale().await {
                            tracing::error!("Stale transaction cleanup failed: {}", e);
                        }
                    }
                })
            )
        ]
    }
}

async fn run_every<F, Fut>(name: &'static str, period: Duration, token: CancellationToken, mut job: F)
    where F: FnMut() -> Fut, Fut: Future<Output = ()>
{
    let mut ticker = interval(period);
    // A slow run pushes the next one back instead of bursting
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(job = name, every_secs = period.as_secs(), "Scheduled job started");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!(job = name, "Scheduled job stopped");
                break;
            }
            _ = ticker.tick() => job().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ NewPendingTransaction, UserRepository };
    use crate::enums::SubscriptionDuration;
    use crate::providers::ReceiptStatus;
    use crate::services::reconciliation_service::test_support::harness;
    use chrono::Utc;

    const HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
    const ALICE: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0";

    fn fast() -> JobIntervals {
        JobIntervals {
            pending_sweep: Duration::from_millis(20),
            expiry_sweep: Duration::from_millis(20),
            cleanup_sweep: Duration::from_millis(20),
            ..JobIntervals::default()
        }
    }

    #[tokio::test]
    async fn test_jobs_run_until_cancelled() {
        let h = harness().await;
        h.pending
            .create(NewPendingTransaction {
                hash: HASH.to_string(),
                user_address: ALICE.to_string(),
                amount: "0.01".to_string(),
                duration: SubscriptionDuration::Month,
                chain_id: 1,
            }).await
            .unwrap();
        h.chain.mine(HASH, ReceiptStatus::Success);

        let bob = "0x00000000000000000000000000000000000000b0";
        UserRepository::set_entitlement_in(&h.db, None, bob, Utc::now() - chrono::Duration::hours(1)).await.unwrap();

        let token = CancellationToken::new();
        let handles = Scheduler::new(h.service.clone(), fast(), token.clone()).start();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(h.pending.find_by_hash(HASH).await.unwrap().status, "completed");
        assert!(h.users.find(ALICE).await.unwrap().unwrap().is_paid_user);
        assert!(!h.users.find(bob).await.unwrap().unwrap().is_paid_user);

        token.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        }
    }
}
