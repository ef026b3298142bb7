use chrono::{ DateTime, Utc };
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{ OpportunityInput, OpportunityPatch, OpportunityRepository };
use crate::enums::{ SortDirection, SortKey };
use crate::error::Result;
use crate::services::opportunity_cache::OpportunityCache;
use crate::services::subscription_service::SubscriptionService;
use crate::services::visibility::{ self, FilteredOpportunities, Opportunity };

pub struct OpportunityService {
    repository: Arc<OpportunityRepository>,
    subscriptions: Arc<SubscriptionService>,
    cache: Arc<OpportunityCache>,
}

impl OpportunityService {
    pub fn new(
        repository: Arc<OpportunityRepository>,
        subscriptions: Arc<SubscriptionService>,
        cache: Arc<OpportunityCache>
    ) -> Self {
        Self {
            repository,
            subscriptions,
            cache,
        }
    }

    /// What the caller's tier may see, sorted per category.
    pub async fn listing(
        &self,
        address: Option<&str>,
        key: SortKey,
        direction: SortDirection
    ) -> Result<FilteredOpportunities> {
        let generation = self.cache.generation();
        let tier = self.subscriptions.tier_for(address).await?;
        let cache_key = OpportunityCache::key_for(address);

        let filtered = match self.cache.get(&cache_key, tier).await {
            Some(hit) => hit,
            None => {
                let all = self.list().await?;
                let filtered = visibility::filter(all, tier, Utc::now());
                self.cache.put(&cache_key, filtered.clone(), generation).await;
                filtered
            }
        };

        Ok(filtered.sorted(key, direction))
    }

    pub async fn list(&self) -> Result<Vec<Opportunity>> {
        self.repository
            .list_all().await?
            .into_iter()
            .map(Opportunity::try_from)
            .collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Opportunity> {
        self.repository.find_by_id(id).await?.try_into()
    }

    pub async fn create(&self, input: OpportunityInput) -> Result<Opportunity> {
        let created = self.repository.create(input).await?;
        self.cache.invalidate_all().await;
        tracing::info!(id = %created.id, name = %created.name, "Opportunity created");
        created.try_into()
    }

    pub async fn update(&self, id: Uuid, patch: OpportunityPatch) -> Result<Opportunity> {
        let updated = self.repository.update(id, patch).await?;
        self.cache.invalidate_all().await;
        tracing::info!(%id, "Opportunity updated");
        updated.try_into()
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.repository.delete(id).await?;
        self.cache.invalidate_all().await;
        tracing::info!(%id, "Opportunity deleted");
        Ok(())
    }

    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        self.repository.last_updated().await
    }
}
