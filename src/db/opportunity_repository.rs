use chrono::{ DateTime, Utc };
use sea_orm::{
    sea_query::OnConflict,
    ActiveModelTrait,
    ConnectionTrait,
    DatabaseConnection,
    EntityTrait,
    QueryOrder,
    Set,
    TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::enums::{ Category, RelativeRisk };
use crate::error::{ AppError, Result };
use crate::db::entity::{ metadata, yield_opportunity, Metadata, YieldOpportunity };

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityInput {
    pub name: String,
    pub network: String,
    pub link: String,
    #[serde(default)]
    pub notes: String,
    pub estimated_apy: f64,
    pub tvl: f64,
    pub relative_risk: RelativeRisk,
    pub category: Category,
    #[serde(default)]
    pub is_benchmark: bool,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityPatch {
    pub name: Option<String>,
    pub network: Option<String>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub estimated_apy: Option<f64>,
    pub tvl: Option<f64>,
    pub relative_risk: Option<RelativeRisk>,
    pub category: Option<Category>,
    pub is_benchmark: Option<bool>,
}

fn validate_amounts(estimated_apy: Option<f64>, tvl: Option<f64>) -> Result<()> {
    if let Some(apy) = estimated_apy {
        if !apy.is_finite() || apy < 0.0 {
            return Err(AppError::InvalidInput("estimatedApy must be a non-negative number".into()));
        }
    }
    if let Some(tvl) = tvl {
        if !tvl.is_finite() || tvl < 0.0 {
            return Err(AppError::InvalidInput("tvl must be a non-negative number".into()));
        }
    }
    Ok(())
}

pub struct OpportunityRepository {
    db: DatabaseConnection,
}

impl OpportunityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_all(&self) -> Result<Vec<yield_opportunity::Model>> {
        let opportunities = YieldOpportunity::find()
            .order_by_asc(yield_opportunity::Column::DateAdded)
            .all(&self.db).await?;

        Ok(opportunities)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<yield_opportunity::Model> {
        YieldOpportunity::find_by_id(id)
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", id)))
    }

    /// Inserts the row and bumps `yieldLastUpdated` in one transaction.
    pub async fn create(&self, input: OpportunityInput) -> Result<yield_opportunity::Model> {
        validate_amounts(Some(input.estimated_apy), Some(input.tvl))?;

        let now = Utc::now();
        let model = yield_opportunity::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            network: Set(input.network),
            link: Set(input.link),
            notes: Set(input.notes),
            estimated_apy: Set(input.estimated_apy),
            tvl: Set(input.tvl),
            relative_risk: Set(input.relative_risk.to_string()),
            category: Set(input.category.to_string()),
            is_benchmark: Set(input.is_benchmark),
            date_added: Set(now),
        };

        let txn = self.db.begin().await?;
        let created = model.insert(&txn).await?;
        Self::touch_metadata_in(&txn, created.id, now).await?;
        txn.commit().await?;

        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: OpportunityPatch
    ) -> Result<yield_opportunity::Model> {
        validate_amounts(patch.estimated_apy, patch.tvl)?;

        let txn = self.db.begin().await?;

        let existing = YieldOpportunity::find_by_id(id)
            .one(&txn).await?
            .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", id)))?;

        let mut active: yield_opportunity::ActiveModel = existing.clone().into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(network) = patch.network {
            active.network = Set(network);
        }
        if let Some(link) = patch.link {
            active.link = Set(link);
        }
        if let Some(notes) = patch.notes {
            active.notes = Set(notes);
        }
        if let Some(apy) = patch.estimated_apy {
            active.estimated_apy = Set(apy);
        }
        if let Some(tvl) = patch.tvl {
            active.tvl = Set(tvl);
        }
        if let Some(risk) = patch.relative_risk {
            active.relative_risk = Set(risk.to_string());
        }
        if let Some(category) = patch.category {
            active.category = Set(category.to_string());
        }
        if let Some(is_benchmark) = patch.is_benchmark {
            active.is_benchmark = Set(is_benchmark);
        }

        let updated = if active.is_changed() { active.update(&txn).await? } else { existing };
        Self::touch_metadata_in(&txn, id, Utc::now()).await?;
        txn.commit().await?;

        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let txn = self.db.begin().await?;

        let result = YieldOpportunity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::NotFound(format!("Opportunity {} not found", id)));
        }

        Self::touch_metadata_in(&txn, id, Utc::now()).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let row = Metadata::find_by_id(metadata::YIELD_DATA_KEY.to_string()).one(&self.db).await?;
        Ok(row.and_then(|m| m.yield_last_updated))
    }

    async fn touch_metadata_in<C: ConnectionTrait>(
        conn: &C,
        opportunity_id: Uuid,
        now: DateTime<Utc>
    ) -> Result<()> {
        let row = metadata::ActiveModel {
            key: Set(metadata::YIELD_DATA_KEY.to_string()),
            yield_last_updated: Set(Some(now)),
            updated_opportunity_id: Set(Some(opportunity_id)),
        };

        Metadata::insert(row)
            .on_conflict(
                OnConflict::column(metadata::Column::Key)
                    .update_columns([
                        metadata::Column::YieldLastUpdated,
                        metadata::Column::UpdatedOpportunityId,
                    ])
                    .to_owned()
            )
            .exec_without_returning(conn).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;

    fn input(name: &str, category: Category) -> OpportunityInput {
        OpportunityInput {
            name: name.to_string(),
            network: "Ethereum".to_string(),
            link: "https://example.com".to_string(),
            notes: String::new(),
            estimated_apy: 5.0,
            tvl: 1_000_000.0,
            relative_risk: RelativeRisk::Low,
            category,
            is_benchmark: false,
        }
    }

    #[tokio::test]
    async fn test_every_mutation_bumps_last_updated() {
        let repo = OpportunityRepository::new(setup_db().await);
        assert!(repo.last_updated().await.unwrap().is_none());

        let created = repo.create(input("Aave USDC", Category::Stablecoin)).await.unwrap();
        let after_create = repo.last_updated().await.unwrap().unwrap();

        let patch = OpportunityPatch { estimated_apy: Some(7.5), ..Default::default() };
        let updated = repo.update(created.id, patch).await.unwrap();
        assert_eq!(updated.estimated_apy, 7.5);
        assert_eq!(updated.name, "Aave USDC");
        let after_update = repo.last_updated().await.unwrap().unwrap();
        assert!(after_update >= after_create);

        repo.delete(created.id).await.unwrap();
        let after_delete = repo.last_updated().await.unwrap().unwrap();
        assert!(after_delete >= after_update);
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_negative_values() {
        let repo = OpportunityRepository::new(setup_db().await);
        let mut bad = input("Broken", Category::Stablecoin);
        bad.tvl = -1.0;
        assert!(matches!(repo.create(bad).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let repo = OpportunityRepository::new(setup_db().await);
        let id = Uuid::new_v4();
        assert!(matches!(repo.delete(id).await, Err(AppError::NotFound(_))));
        assert!(
            matches!(repo.update(id, OpportunityPatch::default()).await, Err(AppError::NotFound(_)))
        );
        // A failed mutation leaves the timestamp untouched
        assert!(repo.last_updated().await.unwrap().is_none());
    }
}
