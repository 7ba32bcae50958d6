//! TTL-based floor price cache with a pluggable price source.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::GroupId;
use crate::port::PriceSource;

#[derive(Debug, Clone, Copy)]
struct FloorEntry {
    price: Decimal,
    refreshed_at: DateTime<Utc>,
}

/// Best known ask price per edition group.
///
/// A cached value is never served past its TTL without a refresh attempt
/// first. When the refresh fails, the stale value is served as a
/// fallback so the watcher keeps producing deal signals through price
/// source blips. Capacity is bounded; least-recently-refreshed entries
/// are purged first.
pub struct FloorPriceCache {
    entries: RwLock<HashMap<GroupId, FloorEntry>>,
    source: Arc<dyn PriceSource>,
    ttl: Duration,
    capacity: usize,
}

impl FloorPriceCache {
    #[must_use]
    pub fn new(source: Arc<dyn PriceSource>, ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            source,
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Floor price for the group: cached when fresh, refreshed through
    /// the price source otherwise. Returns `None` when no floor can be
    /// determined (callers drop the event; no deal signal is computable).
    pub async fn get(&self, group_id: &GroupId) -> Option<Decimal> {
        let cached = { self.entries.read().get(group_id).copied() };

        if let Some(entry) = cached {
            if Utc::now() - entry.refreshed_at <= self.ttl {
                return Some(entry.price);
            }
        }

        match self.source.floor_price(group_id).await {
            Ok(Some(price)) => {
                self.store(group_id, price);
                Some(price)
            }
            Ok(None) => {
                self.entries.write().remove(group_id);
                debug!(group = %group_id, "No floor price available upstream");
                None
            }
            Err(err) => {
                warn!(group = %group_id, error = %err, "Floor price refresh failed");
                cached.map(|entry| entry.price)
            }
        }
    }

    /// Opportunistic refresh: a newly observed listing undercut the
    /// cached floor, so the observed price is the new best ask.
    pub fn update(&self, group_id: &GroupId, observed: Decimal) {
        self.store(group_id, observed);
    }

    fn store(&self, group_id: &GroupId, price: Decimal) {
        let mut entries = self.entries.write();
        entries.insert(
            group_id.clone(),
            FloorEntry {
                price,
                refreshed_at: Utc::now(),
            },
        );
        while entries.len() > self.capacity {
            let stalest = entries
                .iter()
                .min_by_key(|(_, e)| e.refreshed_at)
                .map(|(k, _)| k.clone());
            match stalest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Number of cached groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
