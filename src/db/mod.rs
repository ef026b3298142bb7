use chrono::{ DateTime, Utc };
use sea_orm::{
    entity::prelude::*,
    sea_query::Expr,
    ConnectionTrait,
    DatabaseConnection,
    QuerySelect,
    Set,
    TransactionTrait,
};

use crate::error::{ AppError, Result };

pub mod entity;
pub use entity::*;

mod pending_transaction_repository;
pub use pending_transaction_repository::{ PendingTransactionRepository, NewPendingTransaction };

mod opportunity_repository;
pub use opportunity_repository::{ OpportunityRepository, OpportunityInput, OpportunityPatch };

pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find(&self, address: &str) -> Result<Option<entity::user::Model>> {
        Self::find_in(&self.db, address).await
    }

    pub async fn find_in<C: ConnectionTrait>(
        conn: &C,
        address: &str
    ) -> Result<Option<entity::user::Model>> {
        let user = entity::User::find_by_id(address.to_string()).one(conn).await?;
        Ok(user)
    }

    /// Reads the row under an exclusive lock so concurrent grants for the
    /// same user serialise. Must be called inside a transaction.
    pub async fn find_for_update<C: ConnectionTrait>(
        conn: &C,
        address: &str
    ) -> Result<Option<entity::user::Model>> {
        let user = entity::User
            ::find_by_id(address.to_string())
            .lock_exclusive()
            .one(conn).await?;
        Ok(user)
    }

    /// First wallet connection creates the user unentitled.
    pub async fn get_or_create(&self, address: &str) -> Result<entity::user::Model> {
        if let Some(user) = self.find(address).await? {
            return Ok(user);
        }

        let user = entity::user::ActiveModel {
            address: Set(address.to_string()),
            is_paid_user: Set(false),
            subscription_expiry: Set(None),
            subscription_expired_at: Set(None),
            telegram_notifications_enabled: Set(false),
            telegram_chat_id: Set(None),
            created_at: Set(Utc::now()),
        };

        match user.insert(&self.db).await {
            Ok(user) => Ok(user),
            // Lost a race against another first connection
            Err(e) => self.find(address).await?.ok_or(AppError::StoreUnavailable(e)),
        }
    }

    /// Writes `is_paid_user = true` and the new expiry, creating the row if needed.
    pub async fn set_entitlement_in<C: ConnectionTrait>(
        conn: &C,
        existing: Option<entity::user::Model>,
        address: &str,
        expiry: DateTime<Utc>
    ) -> Result<entity::user::Model> {
        let user = match existing {
            Some(user) => {
                let mut active: entity::user::ActiveModel = user.into();
                active.is_paid_user = Set(true);
                active.subscription_expiry = Set(Some(expiry));
                active.update(conn).await?
            }
            None => {
                let active = entity::user::ActiveModel {
                    address: Set(address.to_string()),
                    is_paid_user: Set(true),
                    subscription_expiry: Set(Some(expiry)),
                    subscription_expired_at: Set(None),
                    telegram_notifications_enabled: Set(false),
                    telegram_chat_id: Set(None),
                    created_at: Set(Utc::now()),
                };
                active.insert(conn).await?
            }
        };

        Ok(user)
    }

    /// Clears the flag only while the stored expiry is still in the past.
    /// Returns whether a row changed.
    pub async fn revoke_if_expired(&self, address: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = entity::User
            ::update_many()
            .col_expr(entity::user::Column::IsPaidUser, Expr::value(false))
            .filter(entity::user::Column::Address.eq(address))
            .filter(entity::user::Column::IsPaidUser.eq(true))
            .filter(entity::user::Column::SubscriptionExpiry.lte(now))
            .exec(&self.db).await?;

        Ok(result.rows_affected > 0)
    }

    /// Revokes every flagged user whose expiry has passed, in one transaction.
    /// Returns the users that were revoked.
    pub async fn revoke_all_expired(&self, now: DateTime<Utc>) -> Result<Vec<entity::user::Model>> {
        let txn = self.db.begin().await?;

        let expired = entity::User
            ::find()
            .filter(entity::user::Column::IsPaidUser.eq(true))
            .filter(entity::user::Column::SubscriptionExpiry.lte(now))
            .all(&txn).await?;

        if expired.is_empty() {
            txn.commit().await?;
            return Ok(expired);
        }

        let addresses: Vec<String> = expired
            .iter()
            .map(|u| u.address.clone())
            .collect();

        entity::User
            ::update_many()
            .col_expr(entity::user::Column::IsPaidUser, Expr::value(false))
            .col_expr(entity::user::Column::SubscriptionExpiredAt, Expr::value(now))
            .filter(entity::user::Column::Address.is_in(addresses))
            .filter(entity::user::Column::IsPaidUser.eq(true))
            .filter(entity::user::Column::SubscriptionExpiry.lte(now))
            .exec(&txn).await?;

        txn.commit().await?;
        Ok(expired)
    }

    pub async fn update_telegram_settings(
        &self,
        address: &str,
        enabled: bool,
        chat_id: Option<String>
    ) -> Result<entity::user::Model> {
        let user = self
            .find(address).await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", address)))?;

        let mut active: entity::user::ActiveModel = user.into();
        active.telegram_notifications_enabled = Set(enabled);
        active.telegram_chat_id = Set(chat_id);

        Ok(active.update(&self.db).await?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALICE: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0";

    #[tokio::test]
    async fn test_get_or_create_defaults_to_unpaid() {
        let repo = UserRepository::new(test_support::setup_db().await);

        let user = repo.get_or_create(ALICE).await.unwrap();
        assert!(!user.is_paid_user);
        assert!(user.subscription_expiry.is_none());
        assert!(!user.telegram_notifications_enabled);

        // Second connection returns the same row
        let again = repo.get_or_create(ALICE).await.unwrap();
        assert_eq!(again.created_at, user.created_at);
    }

    #[tokio::test]
    async fn test_revoke_all_expired_only_touches_past_expiries() {
        let db = test_support::setup_db().await;
        let repo = UserRepository::new(db.clone());
        let now = Utc::now();
        let bob = "0x00000000000000000000000000000000000000b0";

        UserRepository::set_entitlement_in(&db, None, ALICE, now - Duration::days(1)).await.unwrap();
        UserRepository::set_entitlement_in(&db, None, bob, now + Duration::days(1)).await.unwrap();

        let revoked = repo.revoke_all_expired(now).await.unwrap();
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].address, ALICE);

        let alice = repo.find(ALICE).await.unwrap().unwrap();
        assert!(!alice.is_paid_user);
        assert!(alice.subscription_expired_at.is_some());
        assert!(repo.find(bob).await.unwrap().unwrap().is_paid_user);

        // Nothing left to do on a second pass
        assert!(repo.revoke_all_expired(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_telegram_settings_requires_user() {
        let repo = UserRepository::new(test_support::setup_db().await);
        let err = repo.update_telegram_settings(ALICE, true, Some("42".into())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        repo.get_or_create(ALICE).await.unwrap();
        let user = repo.update_telegram_settings(ALICE, true, Some("42".into())).await.unwrap();
        assert!(user.telegram_notifications_enabled);
        assert_eq!(user.telegram_chat_id.as_deref(), Some("42"));
    }
}
