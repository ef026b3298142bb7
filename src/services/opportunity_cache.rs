use std::collections::HashMap;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::time::{ Duration, Instant };
use tokio::sync::RwLock;

use crate::enums::Tier;
use crate::services::visibility::FilteredOpportunities;

/// Key for callers without a wallet.
pub const PUBLIC_KEY: &str = "public";

struct CacheEntry {
    value: FilteredOpportunities,
    stored_at: Instant,
}

/// Short-lived cache of filtered listings, keyed by address (or `public`).
/// An entry computed for a different tier is treated as missing.
///
/// Every invalidation bumps a generation counter. Callers read it before
/// loading data and hand it back to `put`, which drops the value if an
/// invalidation happened in between.
pub struct OpportunityCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    // Only bumped while holding the `entries` write lock
    generation: AtomicU64,
}

impl OpportunityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn key_for(address: Option<&str>) -> String {
        address.unwrap_or(PUBLIC_KEY).to_string()
    }

    pub async fn get(&self, key: &str, tier: Tier) -> Option<FilteredOpportunities> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        if entry.stored_at.elapsed() >= self.ttl || entry.value.tier != tier {
            return None;
        }

        Some(entry.value.clone())
    }

    /// Stores `value` unless the cache was invalidated after `generation`
    /// was read. Returns whether it was stored.
    pub async fn put(&self, key: &str, value: FilteredOpportunities, generation: u64) -> bool {
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(key, "Skipping cache write computed before an invalidation");
            return false;
        }
        // Drop whatever has gone stale while we hold the lock
        entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        entries.insert(key.to_string(), CacheEntry {
            value,
            stored_at: Instant::now(),
        });
        true
    }

    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Opportunity cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
