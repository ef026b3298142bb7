use chrono::{ DateTime, Months, Utc };
use serde::Serialize;
use std::sync::Arc;

use crate::db::entity::user;
use crate::db::UserRepository;
use crate::enums::{ SubscriptionDuration, Tier };
use crate::error::Result;
use crate::services::opportunity_cache::OpportunityCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionReason {
    UnknownUser,
    NotPaid,
    /// Flag set without an expiry. Should not happen.
    MissingExpiry,
    Expired,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub entitled: bool,
    pub reason: ResolutionReason,
    pub subscription_expiry: Option<DateTime<Utc>>,
}

/// Pure entitlement decision on a (possibly stale) snapshot.
pub fn resolve_snapshot(user: Option<&user::Model>, now: DateTime<Utc>) -> Resolution {
    let Some(user) = user else {
        return Resolution {
            entitled: false,
            reason: ResolutionReason::UnknownUser,
            subscription_expiry: None,
        };
    };

    let reason = if !user.is_paid_user {
        ResolutionReason::NotPaid
    } else {
        match user.subscription_expiry {
            None => ResolutionReason::MissingExpiry,
            Some(expiry) if expiry <= now => ResolutionReason::Expired,
            Some(_) => ResolutionReason::Active,
        }
    };

    Resolution {
        entitled: reason == ResolutionReason::Active,
        reason,
        subscription_expiry: user.subscription_expiry,
    }
}

/// New expiry after a grant. Stacks on a still-running subscription,
/// otherwise starts from `now`. Calendar months, clamped to month end.
pub fn extend_expiry(
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    duration: SubscriptionDuration
) -> DateTime<Utc> {
    let base = match current {
        Some(expiry) if expiry > now => expiry,
        _ => now,
    };

    base.checked_add_months(Months::new(duration.months())).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct SubscriptionService {
    users: Arc<UserRepository>,
    cache: Arc<OpportunityCache>,
}

impl SubscriptionService {
    pub fn new(users: Arc<UserRepository>, cache: Arc<OpportunityCache>) -> Self {
        Self { users, cache }
    }

    /// Fresh read plus the lazy revoke when the stored flag outlived its expiry.
    pub async fn resolve(&self, address: &str) -> Result<Resolution> {
        let now = Utc::now();
        let user = self.users.find(address).await?;
        let resolution = resolve_snapshot(user.as_ref(), now);

        if resolution.reason == ResolutionReason::Expired {
            if self.users.revoke_if_expired(address, now).await? {
                tracing::info!(address, "Subscription expired, access revoked on read");
                self.cache.invalidate(address).await;
            }
        }

        Ok(resolution)
    }

    pub async fn tier_for(&self, address: Option<&str>) -> Result<Tier> {
        let Some(address) = address else {
            return Ok(Tier::Public);
        };

        let resolution = self.resolve(address).await?;
        Ok(if resolution.entitled { Tier::Paid } else { Tier::Free })
    }
}
