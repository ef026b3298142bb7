use chrono::{ DateTime, Duration, Utc };
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::db::entity::yield_opportunity;
use crate::enums::{ Category, RelativeRisk, SortDirection, SortKey, Tier };
use crate::error::{ AppError, Result };
use crate::format::{ format_tvl, risk_adjusted_apy };

/// New rows stay hidden from non-paid tiers for this long.
pub const WITHHELD_WINDOW_HOURS: i64 = 48;

/// Opportunity as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: Uuid,
    pub name: String,
    pub network: String,
    pub link: String,
    pub notes: String,
    pub estimated_apy: f64,
    pub risk_adjusted_apy: f64,
    pub tvl: f64,
    pub formatted_tvl: String,
    pub relative_risk: RelativeRisk,
    pub category: Category,
    pub is_benchmark: bool,
    pub date_added: DateTime<Utc>,
}

impl TryFrom<yield_opportunity::Model> for Opportunity {
    type Error = AppError;

    fn try_from(model: yield_opportunity::Model) -> Result<Self> {
        let relative_risk: RelativeRisk = model.relative_risk.parse()?;
        let category: Category = model.category.parse()?;

        Ok(Self {
            risk_adjusted_apy: risk_adjusted_apy(
                model.estimated_apy,
                &model.network,
                relative_risk,
                model.tvl,
                model.is_benchmark,
                category
            ),
            formatted_tvl: format_tvl(model.tvl),
            id: model.id,
            name: model.name,
            network: model.network,
            link: model.link,
            notes: model.notes,
            estimated_apy: model.estimated_apy,
            tvl: model.tvl,
            relative_risk,
            category,
            is_benchmark: model.is_benchmark,
            date_added: model.date_added,
        })
    }
}

/// One slot per category, all present from the start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByCategory<T> {
    pub stablecoin: T,
    pub volatile_asset: T,
    pub advanced_strategies: T,
}

impl<T> ByCategory<T> {
    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Stablecoin => &self.stablecoin,
            Category::VolatileAsset => &self.volatile_asset,
            Category::AdvancedStrategies => &self.advanced_strategies,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut T {
        match category {
            Category::Stablecoin => &mut self.stablecoin,
            Category::VolatileAsset => &mut self.volatile_asset,
            Category::AdvancedStrategies => &mut self.advanced_strategies,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::all()
            .iter()
            .map(move |&c| (c, self.get(c)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListing {
    pub visible: Vec<Opportunity>,
    pub hidden_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredOpportunities {
    pub tier: Tier,
    pub categories: ByCategory<CategoryListing>,
    /// Rows withheld across all categories.
    pub recent_count: usize,
}

fn is_withheld(opportunity: &Opportunity, tier: Tier, now: DateTime<Utc>) -> bool {
    if tier == Tier::Paid {
        return false;
    }
    opportunity.category == Category::AdvancedStrategies ||
        opportunity.date_added > now - Duration::hours(WITHHELD_WINDOW_HOURS)
}

/// Splits every row into its category and decides what the tier may see.
/// Counts are taken before anything is withheld.
pub fn filter(all: Vec<Opportunity>, tier: Tier, now: DateTime<Utc>) -> FilteredOpportunities {
    let mut categories: ByCategory<CategoryListing> = ByCategory::default();
    let mut recent_count = 0;

    for opportunity in all {
        let listing = categories.get_mut(opportunity.category);
        listing.total_count += 1;

        if is_withheld(&opportunity, tier, now) {
            listing.hidden_count += 1;
            recent_count += 1;
        } else {
            listing.visible.push(opportunity);
        }
    }

    FilteredOpportunities {
        tier,
        categories,
        recent_count,
    }
}

fn compare_by(a: &Opportunity, b: &Opportunity, key: SortKey) -> Ordering {
    match key {
        SortKey::EstimatedApy => a.estimated_apy.total_cmp(&b.estimated_apy),
        SortKey::Tvl => a.tvl.total_cmp(&b.tvl),
        SortKey::RelativeRisk => a.relative_risk.cmp(&b.relative_risk),
    }
}

/// Benchmark rows first, the rest by `key` in `direction`. Stable.
pub fn sort(rows: &mut [Opportunity], key: SortKey, direction: SortDirection) {
    rows.sort_by(|a, b| {
        b.is_benchmark.cmp(&a.is_benchmark).then_with(|| {
            let ordering = compare_by(a, b, key);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
    });
}

impl FilteredOpportunities {
    pub fn sorted(mut self, key: SortKey, direction: SortDirection) -> Self {
        for category in Category::all() {
            sort(&mut self.categories.get_mut(*category).visible, key, direction);
        }
        self
    }
}
