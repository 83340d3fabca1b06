//! Short-lived balance cache
//!
//! Loops read the same balances several times per iteration. Entries live
//! for one window and are then re-queried; the bot's own trades drop the
//! affected entries immediately so post-trade reads always hit the chain.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::chain::ChainClient;
use crate::error::{Error, Result};
use crate::types::{Address, Amount, Asset};

/// Cache key: one asset balance of one account
pub type BalanceKey = (Address, Asset);

/// Cached balance with its fetch time
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub balance: Amount,
    pub fetched_at: Instant,
}

impl CacheEntry {
    pub fn new(balance: Amount) -> Self {
        Self {
            balance,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, window: Duration) -> bool {
        self.fetched_at.elapsed() < window
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Balance cache keyed by `(address, asset)`
pub struct BalanceCache {
    chain: Arc<dyn ChainClient>,
    window: Duration,
    entries: DashMap<BalanceKey, CacheEntry>,
    /// Per-key refresh locks, pruned on invalidation once idle
    locks: DashMap<BalanceKey, Arc<Mutex<()>>>,
    stats: CacheStats,
}

impl BalanceCache {
    pub fn new(chain: Arc<dyn ChainClient>, window: Duration) -> Self {
        Self {
            chain,
            window,
            entries: DashMap::new(),
            locks: DashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Balance of `asset` held by `address`, served from cache while fresh
    pub async fn get(&self, address: &Address, asset: &Asset) -> Result<Amount> {
        let key = (address.clone(), asset.clone());

        // Clone the lock out so no map guard is held across the await
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock().await;

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_fresh(self.window) {
                self.stats.record_hit();
                debug!("Balance cache hit for {} / {}", address.short(), asset.symbol());
                return Ok(entry.balance.clone());
            }
        }

        self.stats.record_miss();
        let balance = self
            .chain
            .query_balance(address, asset)
            .await
            .map_err(|cause| Error::BalanceQuery {
                address: address.clone(),
                asset: asset.clone(),
                cause: Box::new(cause),
            })?;

        self.entries.insert(key, CacheEntry::new(balance.clone()));
        Ok(balance)
    }

    /// Drop one entry
    pub fn invalidate(&self, address: &Address, asset: &Asset) {
        let key = (address.clone(), asset.clone());
        self.entries.remove(&key);
        // A lock still cloned out belongs to an in-flight `get`
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Drop every entry for `address`
    pub fn invalidate_address(&self, address: &Address) {
        self.entries.retain(|(owner, _), _| owner != address);
        self.locks
            .retain(|(owner, _), lock| owner != address || Arc::strong_count(lock) > 1);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
