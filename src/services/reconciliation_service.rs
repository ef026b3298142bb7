use chrono::{ DateTime, Utc };
use ethers::utils::parse_ether;
use sea_orm::{ DatabaseConnection, TransactionTrait };
use serde::Serialize;
use std::sync::Arc;

use crate::db::entity::{ pending_transaction, user };
use crate::db::{ PendingTransactionRepository, UserRepository };
use crate::enums::{ SubscriptionDuration, TxStatus };
use crate::error::{ AppError, Result };
use crate::providers::{ ReceiptSource, ReceiptStatus, TransactionReceipt };
use crate::services::notification_service::NotificationService;
use crate::services::opportunity_cache::OpportunityCache;
use crate::services::subscription_service::extend_expiry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// This call granted the entitlement
    #[serde(rename_all = "camelCase")]
    Completed {
        subscription_expiry: DateTime<Utc>,
    },
    /// Reverted on chain, or did not pay what was asked
    Failed,
    /// No receipt yet
    StillPending,
    /// Someone else already moved it out of pending
    AlreadyResolved {
        status: TxStatus,
    },
}

impl ReconcileOutcome {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ReconcileOutcome::StillPending)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}

pub struct ReconciliationService {
    db: DatabaseConnection,
    users: Arc<UserRepository>,
    pending: Arc<PendingTransactionRepository>,
    receipts: Arc<dyn ReceiptSource>,
    cache: Arc<OpportunityCache>,
    notifications: Arc<NotificationService>,
    receiver_address: String,
    retention: chrono::Duration,
}

impl ReconciliationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        users: Arc<UserRepository>,
        pending: Arc<PendingTransactionRepository>,
        receipts: Arc<dyn ReceiptSource>,
        cache: Arc<OpportunityCache>,
        notifications: Arc<NotificationService>,
        receiver_address: &str,
        retention: chrono::Duration
    ) -> Self {
        Self {
            db,
            users,
            pending,
            receipts,
            cache,
            notifications,
            receiver_address: receiver_address.to_lowercase(),
            retention,
        }
    }

    /// Confirms one payment and applies it. Safe to call any number of
    /// times, from any number of places, for the same hash.
    pub async fn reconcile(&self, hash: &str) -> Result<ReconcileOutcome> {
        let record = self.pending.find_by_hash(hash).await?;
        self.reconcile_record(&record).await
    }

    async fn reconcile_record(
        &self,
        record: &pending_transaction::Model
    ) -> Result<ReconcileOutcome> {
        let status: TxStatus = record.status.parse()?;
        if status.is_terminal() {
            return Ok(ReconcileOutcome::AlreadyResolved { status });
        }

        if self.pending.is_processed(&record.hash).await? {
            tracing::warn!(
                tx_hash = %record.hash,
                user = %record.user_address,
                "Transaction already paid for a subscription"
            );
            return self.fail(record).await;
        }

        let receipt = self.receipts.get_transaction_receipt(&record.hash, record.chain_id as u64).await?;

        let Some(receipt) = receipt else {
            tracing::debug!(tx_hash = %record.hash, "No receipt yet");
            return Ok(ReconcileOutcome::StillPending);
        };

        match receipt.status {
            ReceiptStatus::Success if self.pays_subscription(&receipt, record) => {
                self.complete(record).await
            }
            ReceiptStatus::Success => {
                tracing::warn!(
                    tx_hash = %record.hash,
                    user = %record.user_address,
                    from = %receipt.from,
                    to = ?receipt.to,
                    value = %receipt.value,
                    "Transaction succeeded but did not pay the subscription"
                );
                self.fail(record).await
            }
            ReceiptStatus::Reverted => self.fail(record).await,
        }
    }

    /// The user's own wallet sent at least the recorded amount straight to
    /// the receiver.
    fn pays_subscription(
        &self,
        receipt: &TransactionReceipt,
        record: &pending_transaction::Model
    ) -> bool {
        let from_user = receipt.from.eq_ignore_ascii_case(&record.user_address);
        let to_receiver = receipt.to
            .as_deref()
            .is_some_and(|to| to.eq_ignore_ascii_case(&self.receiver_address));
        let enough = parse_ether(&record.amount).is_ok_and(|expected| receipt.value >= expected);

        from_user && to_receiver && enough
    }

    async fn complete(&self, record: &pending_transaction::Model) -> Result<ReconcileOutcome> {
        let duration: SubscriptionDuration = record.duration.parse()?;

        let granted = self.grant(record, duration).await.map_err(|e| match e {
            AppError::StoreUnavailable(db_err) => {
                tracing::error!(
                    tx_hash = %record.hash,
                    user = %record.user_address,
                    "Entitlement grant failed, will retry: {}",
                    db_err
                );
                AppError::EntitlementWriteFailure(db_err.to_string())
            }
            other => other,
        })?;

        let Some(user) = granted else {
            tracing::debug!(tx_hash = %record.hash, "Already reconciled elsewhere");
            return Ok(ReconcileOutcome::AlreadyResolved { status: TxStatus::Completed });
        };

        let Some(expiry) = user.subscription_expiry else {
            return Err(AppError::Internal(format!("Grant for {} wrote no expiry", record.hash)));
        };

        tracing::info!(
            tx_hash = %record.hash,
            user = %user.address,
            %duration,
            expiry = %expiry,
            "Subscription granted"
        );

        self.cache.invalidate(&user.address).await;
        self.notifications.subscription_granted(&user, expiry).await;

        Ok(ReconcileOutcome::Completed { subscription_expiry: expiry })
    }

    /// Flips the record to completed, writes the processed-payment ledger and
    /// extends the user in one transaction. `None` when the record was no
    /// longer pending.
    async fn grant(
        &self,
        record: &pending_transaction::Model,
        duration: SubscriptionDuration
    ) -> Result<Option<user::Model>> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let transitioned = PendingTransactionRepository::transition_in(
            &txn,
            &record.hash,
            TxStatus::Completed,
            now
        ).await?;

        if !transitioned {
            txn.rollback().await?;
            return Ok(None);
        }

        PendingTransactionRepository::record_processed_in(&txn, record, now).await?;

        let existing = UserRepository::find_for_update(&txn, &record.user_address).await?;
        let expiry = extend_expiry(
            existing.as_ref().and_then(|u| u.subscription_expiry),
            now,
            duration
        );
        let user = UserRepository::set_entitlement_in(&txn, existing, &record.user_address, expiry).await?;

        txn.commit().await?;
        Ok(Some(user))
    }

    async fn fail(&self, record: &pending_transaction::Model) -> Result<ReconcileOutcome> {
        let transitioned = PendingTransactionRepository::transition_in(
            &self.db,
            &record.hash,
            TxStatus::Failed,
            Utc::now()
        ).await?;

        if !transitioned {
            let current = self.pending.find_by_hash(&record.hash).await?;
            return Ok(ReconcileOutcome::AlreadyResolved { status: current.status.parse()? });
        }

        tracing::info!(tx_hash = %record.hash, user = %record.user_address, "Payment failed on chain");
        Ok(ReconcileOutcome::Failed)
    }

    /// Reconciles every pending record. Per-record errors are logged and
    /// left for the next sweep.
    pub async fn sweep_pending(&self) -> Result<SweepReport> {
        let records = self.pending.find_pending().await?;
        let mut report = SweepReport { checked: records.len(), ..Default::default() };

        for record in &records {
            match self.reconcile_record(record).await {
                Ok(ReconcileOutcome::Completed { .. }) => {
                    report.completed += 1;
                }
                Ok(ReconcileOutcome::Failed) => {
                    report.failed += 1;
                }
                Ok(ReconcileOutcome::StillPending) => {
                    report.still_pending += 1;
                }
                Ok(ReconcileOutcome::AlreadyResolved { .. }) => {}
                Err(e) => {
                    report.errors += 1;
                    if e.is_retriable() {
                        tracing::warn!(tx_hash = %record.hash, "Reconciliation deferred: {}", e);
                    } else {
                        tracing::error!(tx_hash = %record.hash, "Reconciliation failed: {}", e);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Revokes every flagged user whose expiry has passed. Returns how many.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let revoked = self.users.revoke_all_expired(Utc::now()).await?;

        for user in &revoked {
            tracing::info!(user = %user.address, "Subscription expired");
            self.cache.invalidate(&user.address).await;
            self.notifications.subscription_expired(user).await;
        }

        Ok(revoked.len())
    }

    /// Drops pending records past the retention window, whatever their status.
    pub async fn cleanup_stale(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.retention;
        let deleted = self.pending.delete_created_before(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, %cutoff, "Removed stale pending transactions");
        }
        Ok(deleted)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::harness;
    use super::*;
    use crate::chains::evm::wallet::ClientBroadcast;
    use crate::config::{ NetworkConfig, NetworkTable, PaymentConfig, DEFAULT_RECEIVER_ADDRESS };
    use crate::db::NewPendingTransaction;
    use crate::enums::Network;
    use crate::services::payment_service::{ test_support::FakeWallet, PaymentService };
    use chrono::Duration;

    const ALICE: &str = super::test_support::PAYER;
    const BOB: &str = "0x1234567890abcdef1234567890abcdef12345678";
    const HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

    fn record(hash: &str, duration: SubscriptionDuration) -> NewPendingTransaction {
        NewPendingTransaction {
            hash: hash.to_string(),
            user_address: ALICE.to_string(),
            amount: PaymentConfig::default().price(duration).to_string(),
            duration,
            chain_id: 1,
        }
    }

    fn payment_service(h: &super::test_support::Harness) -> PaymentService {
        PaymentService::new(
            h.pending.clone(),
            PaymentConfig::default(),
            NetworkTable::new(vec![NetworkConfig::new(Network::Ethereum, vec!["http://localhost:8545".into()])])
        )
    }

    fn close_to(actual: DateTime<Utc>, expected: DateTime<Utc>) -> bool {
        (actual - expected).num_seconds().abs() <= 5
    }

    #[tokio::test]
    async fn test_successful_payment_scenario() {
        let h = harness().await;
        let payments = payment_service(&h);
        h.users.get_or_create(ALICE).await.unwrap();

        let wallet = FakeWallet::paying(HASH);
        let handle = payments.pay(ALICE, SubscriptionDuration::Month, 1, Some(&wallet)).await.unwrap();
        assert_eq!(h.pending.find_by_hash(&handle.hash).await.unwrap().status, "pending");

        h.chain.mine_with(HASH, ReceiptStatus::Success, ALICE, Some(DEFAULT_RECEIVER_ADDRESS), parse_ether("0.01").unwrap());
        let outcome = h.service.reconcile(&handle.hash).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Completed { .. }));

        let user = h.users.find(ALICE).await.unwrap().unwrap();
        assert!(user.is_paid_user);
        let expected = extend_expiry(None, Utc::now(), SubscriptionDuration::Month);
        assert!(close_to(user.subscription_expiry.unwrap(), expected));
        assert_eq!(h.pending.find_by_hash(HASH).await.unwrap().status, "completed");
    }

    #[tokio::test]
    async fn test_reverted_payment_scenario() {
        let h = harness().await;
        h.users.get_or_create(ALICE).await.unwrap();
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.mine(HASH, ReceiptStatus::Reverted);

        assert_eq!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::Failed);

        let user = h.users.find(ALICE).await.unwrap().unwrap();
        assert!(!user.is_paid_user);
        assert!(user.subscription_expiry.is_none());
        assert_eq!(h.pending.find_by_hash(HASH).await.unwrap().status, "failed");
    }

    #[tokio::test]
    async fn test_stuck_transaction_is_cleaned_up_after_retention() {
        let h = harness().await;
        h.users.get_or_create(ALICE).await.unwrap();
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.pending.backdate(HASH, Utc::now() - Duration::days(8)).await.unwrap();

        assert_eq!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::StillPending);
        assert_eq!(h.service.cleanup_stale().await.unwrap(), 1);

        assert!(matches!(h.pending.find_by_hash(HASH).await, Err(AppError::NotFound(_))));
        assert!(!h.users.find(ALICE).await.unwrap().unwrap().is_paid_user);
    }

    #[tokio::test]
    async fn test_month_stacks_on_active_subscription() {
        let h = harness().await;
        let current = Utc::now() + Duration::days(10);
        UserRepository::set_entitlement_in(&h.db, None, ALICE, current).await.unwrap();
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.mine(HASH, ReceiptStatus::Success);

        h.service.reconcile(HASH).await.unwrap();

        let user = h.users.find(ALICE).await.unwrap().unwrap();
        assert!(close_to(user.subscription_expiry.unwrap(), current + chrono::Months::new(1)));
    }

    #[tokio::test]
    async fn test_year_after_lapse_counts_from_now() {
        let h = harness().await;
        UserRepository::set_entitlement_in(&h.db, None, ALICE, Utc::now() - Duration::days(3)).await.unwrap();
        h.pending.create(record(HASH, SubscriptionDuration::Year)).await.unwrap();
        h.chain.mine(HASH, ReceiptStatus::Success);

        h.service.reconcile(HASH).await.unwrap();

        let user = h.users.find(ALICE).await.unwrap().unwrap();
        let expected = Utc::now() + chrono::Months::new(12);
        assert!(close_to(user.subscription_expiry.unwrap(), expected));
    }

    #[tokio::test]
    async fn test_reconciles_at_most_once() {
        let h = harness().await;
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.mine(HASH, ReceiptStatus::Success);

        let first = h.service.reconcile(HASH).await.unwrap();
        let expiry = h.users.find(ALICE).await.unwrap().unwrap().subscription_expiry;

        let second = h.service.reconcile(HASH).await.unwrap();
        assert!(matches!(first, ReconcileOutcome::Completed { .. }));
        assert_eq!(second, ReconcileOutcome::AlreadyResolved { status: TxStatus::Completed });
        assert_eq!(h.users.find(ALICE).await.unwrap().unwrap().subscription_expiry, expiry);
    }

    #[tokio::test]
    async fn test_stale_pending_snapshot_does_not_grant_twice() {
        let h = harness().await;
        let stale = h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.mine(HASH, ReceiptStatus::Success);

        h.service.reconcile(HASH).await.unwrap();
        let expiry = h.users.find(ALICE).await.unwrap().unwrap().subscription_expiry;

        // A concurrent reconciler that read the row while it was still pending
        let outcome = h.service.reconcile_record(&stale).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyResolved { status: TxStatus::Completed });
        assert_eq!(h.users.find(ALICE).await.unwrap().unwrap().subscription_expiry, expiry);
    }

    #[tokio::test]
    async fn test_concurrent_reconcilers_grant_once() {
        let h = harness().await;
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.mine(HASH, ReceiptStatus::Success);

        let (a, b) = tokio::join!(h.service.reconcile(HASH), h.service.sweep_pending());
        let completed_by_sweep = b.unwrap().completed;
        let completed_by_call = matches!(a.unwrap(), ReconcileOutcome::Completed { .. }) as usize;
        assert_eq!(completed_by_sweep + completed_by_call, 1);

        let user = h.users.find(ALICE).await.unwrap().unwrap();
        let expected = extend_expiry(None, Utc::now(), SubscriptionDuration::Month);
        assert!(close_to(user.subscription_expiry.unwrap(), expected));
    }

    #[tokio::test]
    async fn test_rpc_errors_never_fail_the_payment() {
        let h = harness().await;
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.set_failing(true);

        let err = h.service.reconcile(HASH).await.unwrap_err();
        assert!(matches!(err, AppError::ReconciliationTransientFailure(_)));
        assert_eq!(h.pending.find_by_hash(HASH).await.unwrap().status, "pending");

        let report = h.service.sweep_pending().await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(h.pending.find_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_recipient_or_short_amount_fails() {
        let h = harness().await;
        let other = "0x1111111111111111111111111111111111111111111111111111111111111111";
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.pending.create(record(other, SubscriptionDuration::Year)).await.unwrap();

        h.chain.mine_with(HASH, ReceiptStatus::Success, ALICE, Some(ALICE), parse_ether("0.01").unwrap());
        h.chain.mine_with(
            other,
            ReceiptStatus::Success,
            ALICE,
            Some(DEFAULT_RECEIVER_ADDRESS),
            parse_ether("0.01").unwrap()
        );

        assert_eq!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::Failed);
        assert_eq!(h.service.reconcile(other).await.unwrap(), ReconcileOutcome::Failed);
        assert!(h.users.find(ALICE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contract_creation_does_not_pay() {
        let h = harness().await;
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        h.chain.mine_with(HASH, ReceiptStatus::Success, ALICE, None, parse_ether("0.01").unwrap());

        assert_eq!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::Failed);
        assert!(h.users.find(ALICE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_someone_elses_payment_grants_nothing() {
        let h = harness().await;
        let payments = payment_service(&h);
        h.chain.mine(HASH, ReceiptStatus::Success);

        // Bob claims Alice's transfer first
        let bob_wallet = ClientBroadcast::new(BOB, 1, HASH);
        payments.pay(BOB, SubscriptionDuration::Month, 1, Some(&bob_wallet)).await.unwrap();
        assert_eq!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::Failed);
        assert!(h.users.find(BOB).await.unwrap().is_none());

        // Alice can still claim her own payment
        let alice_wallet = ClientBroadcast::new(ALICE, 1, HASH);
        payments.pay(ALICE, SubscriptionDuration::Month, 1, Some(&alice_wallet)).await.unwrap();
        let outcome = h.service.reconcile(HASH).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Completed { .. }));
        assert!(h.users.find(ALICE).await.unwrap().unwrap().is_paid_user);
    }

    #[tokio::test]
    async fn test_payment_is_not_reusable_after_cleanup() {
        let h = harness().await;
        let payments = payment_service(&h);
        let wallet = ClientBroadcast::new(ALICE, 1, HASH);
        h.chain.mine(HASH, ReceiptStatus::Success);

        payments.pay(ALICE, SubscriptionDuration::Month, 1, Some(&wallet)).await.unwrap();
        assert!(matches!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::Completed { .. }));
        let expiry = h.users.find(ALICE).await.unwrap().unwrap().subscription_expiry;

        h.pending.backdate(HASH, Utc::now() - Duration::days(8)).await.unwrap();
        assert_eq!(h.service.cleanup_stale().await.unwrap(), 1);

        let err = payments.pay(ALICE, SubscriptionDuration::Month, 1, Some(&wallet)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // A record that got in some other way is failed, not granted
        h.pending.create(record(HASH, SubscriptionDuration::Month)).await.unwrap();
        assert_eq!(h.service.reconcile(HASH).await.unwrap(), ReconcileOutcome::Failed);
        assert_eq!(h.users.find(ALICE).await.unwrap().unwrap().subscription_expiry, expiry);
    }

    #[tokio::test]
    async fn test_sweep_expired_revokes_and_invalidates() {
        let h = harness().await;
        UserRepository::set_entitlement_in(&h.db, None, ALICE, Utc::now() - Duration::minutes(1)).await.unwrap();
        let listing = crate::services::visibility::filter(Vec::new(), crate::enums::Tier::Paid, Utc::now());
        h.cache.put(ALICE, listing, h.cache.generation()).await;

        assert_eq!(h.service.sweep_expired().await.unwrap(), 1);
        assert!(!h.users.find(ALICE).await.unwrap().unwrap().is_paid_user);
        assert_eq!(h.cache.len().await, 0);
        assert_eq!(h.service.sweep_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_pending_reports_each_outcome() {
        let h = harness().await;
        let hashes = [
            "0x0000000000000000000000000000000000000000000000000000000000000001",
            "0x0000000000000000000000000000000000000000000000000000000000000002",
            "0x0000000000000000000000000000000000000000000000000000000000000003",
        ];
        for hash in hashes {
            h.pending.create(record(hash, SubscriptionDuration::Month)).await.unwrap();
        }
        h.chain.mine(hashes[0], ReceiptStatus::Success);
        h.chain.mine(hashes[1], ReceiptStatus::Reverted);

        let report = h.service.sweep_pending().await.unwrap();
        assert_eq!(report, SweepReport {
            checked: 3,
            completed: 1,
            failed: 1,
            still_pending: 1,
            errors: 0,
        });
        assert_eq!(*h.chain.lookups.lock().unwrap(), 3);
    }
}
