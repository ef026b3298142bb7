use chrono::{ DateTime, Utc };
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait,
    ColumnTrait,
    ConnectionTrait,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    Set,
};

use crate::enums::{ SubscriptionDuration, TxStatus };
use crate::error::{ AppError, Result };
use crate::db::entity::{ pending_transaction, processed_payment, PendingTransaction, ProcessedPayment };

#[derive(Debug, Clone)]
pub struct NewPendingTransaction {
    pub hash: String,
    pub user_address: String,
    pub amount: String,
    pub duration: SubscriptionDuration,
    pub chain_id: u64,
}

pub struct PendingTransactionRepository {
    db: DatabaseConnection,
}

impl PendingTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, tx: NewPendingTransaction) -> Result<pending_transaction::Model> {
        let model = pending_transaction::ActiveModel {
            hash: Set(tx.hash),
            user_address: Set(tx.user_address),
            amount: Set(tx.amount),
            duration: Set(tx.duration.to_string()),
            chain_id: Set(tx.chain_id as i64),
            status: Set(TxStatus::Pending.to_string()),
            created_at: Set(Utc::now()),
            processed_at: Set(None),
        };

        let created = model.insert(&self.db).await?;
        Ok(created)
    }

    pub async fn find(&self, hash: &str) -> Result<Option<pending_transaction::Model>> {
        Ok(PendingTransaction::find_by_id(hash.to_string()).one(&self.db).await?)
    }

    pub async fn find_by_hash(&self, hash: &str) -> Result<pending_transaction::Model> {
        self.find(hash).await?.ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", hash)))
    }

    pub async fn find_pending(&self) -> Result<Vec<pending_transaction::Model>> {
        let transactions = PendingTransaction::find()
            .filter(pending_transaction::Column::Status.eq(TxStatus::Pending.as_str()))
            .order_by_asc(pending_transaction::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(transactions)
    }

    /// Drops a failed record so its hash can be submitted again. Returns
    /// whether one was removed.
    pub async fn delete_failed(&self, hash: &str) -> Result<bool> {
        let result = PendingTransaction::delete_many()
            .filter(pending_transaction::Column::Hash.eq(hash))
            .filter(pending_transaction::Column::Status.eq(TxStatus::Failed.as_str()))
            .exec(&self.db).await?;

        Ok(result.rows_affected > 0)
    }

    /// Whether `hash` has ever paid for a subscription, even if its pending
    /// record is long gone.
    pub async fn is_processed(&self, hash: &str) -> Result<bool> {
        let found = ProcessedPayment::find_by_id(hash.to_string()).one(&self.db).await?;
        Ok(found.is_some())
    }

    /// Writes the permanent ledger entry for a granted payment. Meant to run
    /// in the same transaction as the grant; a second entry for the same
    /// hash is a primary key violation.
    pub async fn record_processed_in<C: ConnectionTrait>(
        conn: &C,
        record: &pending_transaction::Model,
        now: DateTime<Utc>
    ) -> Result<()> {
        processed_payment::ActiveModel {
            hash: Set(record.hash.clone()),
            user_address: Set(record.user_address.clone()),
            chain_id: Set(record.chain_id),
            duration: Set(record.duration.clone()),
            processed_at: Set(now),
        }
            .insert(conn).await?;
        Ok(())
    }

    /// Moves a transaction out of `pending`. Only the caller that still sees
    /// it pending wins; everyone else gets `false`.
    pub async fn transition_in<C: ConnectionTrait>(
        conn: &C,
        hash: &str,
        to: TxStatus,
        now: DateTime<Utc>
    ) -> Result<bool> {
        if !to.is_terminal() {
            return Err(AppError::Internal(format!("Cannot transition {} back to pending", hash)));
        }

        let result = PendingTransaction::update_many()
            .col_expr(pending_transaction::Column::Status, Expr::value(to.as_str()))
            .col_expr(pending_transaction::Column::ProcessedAt, Expr::value(now))
            .filter(pending_transaction::Column::Hash.eq(hash))
            .filter(pending_transaction::Column::Status.eq(TxStatus::Pending.as_str()))
            .exec(conn).await?;

        Ok(result.rows_affected == 1)
    }

    /// Deletes every record created before `cutoff`, whatever its status.
    pub async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = PendingTransaction::delete_many()
            .filter(pending_transaction::Column::CreatedAt.lt(cutoff))
            .exec(&self.db).await?;

        Ok(result.rows_affected)
    }

    #[cfg(test)]
    pub(crate) async fn backdate(&self, hash: &str, created_at: DateTime<Utc>) -> Result<()> {
        PendingTransaction::update_many()
            .col_expr(pending_transaction::Column::CreatedAt, Expr::value(created_at))
            .filter(pending_transaction::Column::Hash.eq(hash))
            .exec(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;
    use chrono::Duration;

    fn new_tx(hash: &str) -> NewPendingTransaction {
        NewPendingTransaction {
            hash: hash.to_string(),
            user_address: "0x742d35cc6634c0532925a3b844bc9e7595f0beb0".to_string(),
            amount: "0.01".to_string(),
            duration: SubscriptionDuration::Month,
            chain_id: 1,
        }
    }

    #[tokio::test]
    async fn test_transition_happens_once() {
        let db = setup_db().await;
        let repo = PendingTransactionRepository::new(db.clone());
        repo.create(new_tx("0xaa")).await.unwrap();

        let now = Utc::now();
        assert!(
            PendingTransactionRepository::transition_in(&db, "0xaa", TxStatus::Completed, now).await.unwrap()
        );
        assert!(
            !PendingTransactionRepository::transition_in(&db, "0xaa", TxStatus::Failed, now).await.unwrap()
        );

        let stored = repo.find_by_hash("0xaa").await.unwrap();
        assert_eq!(stored.status, "completed");
        assert!(stored.processed_at.is_some());
        assert!(repo.find_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_transition_to_pending() {
        let db = setup_db().await;
        let err = PendingTransactionRepository::transition_in(
            &db,
            "0xaa",
            TxStatus::Pending,
            Utc::now()
        ).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_delete_created_before_ignores_status() {
        let db = setup_db().await;
        let repo = PendingTransactionRepository::new(db.clone());
        let now = Utc::now();

        repo.create(new_tx("0xold")).await.unwrap();
        repo.create(new_tx("0xdone")).await.unwrap();
        repo.create(new_tx("0xnew")).await.unwrap();
        PendingTransactionRepository::transition_in(&db, "0xdone", TxStatus::Completed, now).await.unwrap();
        repo.backdate("0xold", now - Duration::days(8)).await.unwrap();
        repo.backdate("0xdone", now - Duration::days(9)).await.unwrap();

        let deleted = repo.delete_created_before(now - Duration::days(7)).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.find_by_hash("0xnew").await.is_ok());
        assert!(matches!(repo.find_by_hash("0xold").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_processed_ledger_survives_cleanup() {
        let db = setup_db().await;
        let repo = PendingTransactionRepository::new(db.clone());
        let now = Utc::now();

        let record = repo.create(new_tx("0xpaid")).await.unwrap();
        assert!(!repo.is_processed("0xpaid").await.unwrap());
        PendingTransactionRepository::record_processed_in(&db, &record, now).await.unwrap();
        assert!(PendingTransactionRepository::record_processed_in(&db, &record, now).await.is_err());

        repo.backdate("0xpaid", now - Duration::days(30)).await.unwrap();
        assert_eq!(repo.delete_created_before(now - Duration::days(7)).await.unwrap(), 1);
        assert!(repo.find("0xpaid").await.unwrap().is_none());
        assert!(repo.is_processed("0xpaid").await.unwrap());
    }

    #[tokio::test]
    async fn test_only_failed_records_can_be_dropped_for_resubmission() {
        let db = setup_db().await;
        let repo = PendingTransactionRepository::new(db.clone());
        repo.create(new_tx("0xopen")).await.unwrap();
        repo.create(new_tx("0xbad")).await.unwrap();
        PendingTransactionRepository::transition_in(&db, "0xbad", TxStatus::Failed, Utc::now()).await.unwrap();

        assert!(!repo.delete_failed("0xopen").await.unwrap());
        assert!(repo.delete_failed("0xbad").await.unwrap());
        assert!(repo.find("0xopen").await.unwrap().is_some());
        assert!(repo.find("0xbad").await.unwrap().is_none());
    }
}
