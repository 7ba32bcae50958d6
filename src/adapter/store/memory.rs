//! In-memory store implementations for tests and detection-only runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::domain::{ItemId, Listing, ListingRef, ListingStatus};
use crate::error::StoreError;
use crate::port::{CheckpointStore, ListingStore};

/// In-memory listing store backed by a `parking_lot` map.
///
/// Mirrors the SQLite store's semantics exactly so tests against one
/// backend hold for the other.
#[derive(Default)]
pub struct MemoryListingStore {
    listings: RwLock<HashMap<ItemId, Listing>>,
}

impl MemoryListingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn upsert(&self, listing: &Listing) -> Result<(), StoreError> {
        self.listings
            .write()
            .insert(listing.item_id.clone(), listing.clone());
        Ok(())
    }

    async fn mark_sold(
        &self,
        item_id: &ItemId,
        buyer_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(listing) = self.listings.write().get_mut(item_id) {
            listing.status = ListingStatus::Sold;
            if let Some(buyer) = buyer_ref {
                listing.buyer_ref = Some(buyer.to_string());
            }
            listing.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_unlisted(&self, item_id: &ItemId) -> Result<(), StoreError> {
        if let Some(listing) = self.listings.write().get_mut(item_id) {
            listing.status = ListingStatus::Unlisted;
            listing.buyer_ref = None;
            listing.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_buyer(&self, item_id: &ItemId, buyer_ref: &str) -> Result<(), StoreError> {
        if let Some(listing) = self.listings.write().get_mut(item_id) {
            if listing.status == ListingStatus::Sold {
                listing.buyer_ref = Some(buyer_ref.to_string());
                listing.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn get(&self, item_id: &ItemId) -> Result<Option<Listing>, StoreError> {
        Ok(self.listings.read().get(item_id).cloned())
    }

    async fn find_by_listing_ref(
        &self,
        listing_ref: &ListingRef,
    ) -> Result<Option<Listing>, StoreError> {
        Ok(self
            .listings
            .read()
            .values()
            .find(|l| {
                l.status == ListingStatus::Active && l.listing_ref.as_ref() == Some(listing_ref)
            })
            .cloned())
    }

    async fn query_active(
        &self,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .listings
            .read()
            .values()
            .filter(|l| l.status == ListingStatus::Active)
            .filter(|l| older_than.map_or(true, |cutoff| l.listed_at < cutoff))
            .cloned()
            .collect())
    }

    async fn purge_older_than(&self, retention: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - retention;
        let mut listings = self.listings.write();
        let before = listings.len();
        listings.retain(|_, l| l.status == ListingStatus::Active || l.updated_at >= cutoff);
        Ok(before - listings.len())
    }
}

/// In-memory checkpoint store.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    heights: RwLock<HashMap<String, u64>>,
}

impl MemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, name: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.heights.read().get(name).copied())
    }

    async fn store(&self, name: &str, height: u64) -> Result<(), StoreError> {
        self.heights.write().insert(name.to_string(), height);
        Ok(())
    }
}
