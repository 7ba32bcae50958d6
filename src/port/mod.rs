//! Trait definitions at the system's seams.
//!
//! The reconciliation core depends only on these ports; concrete HTTP and
//! SQLite implementations live in [`crate::adapter`]. Test doubles
//! implement the same traits.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::{EventKind, GroupId, ItemId, Listing, ListingRef, RawEvent};
use crate::error::{SourceError, StoreError};

/// Read access to the ledger event API.
///
/// The upstream is eventually consistent and may silently drop ranges;
/// callers must never assume a fetched range is complete. The
/// verification sweep exists to correct for that.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Current sealed ledger height.
    async fn current_height(&self) -> Result<u64, SourceError>;

    /// Fetch raw events of one kind in the inclusive height range.
    ///
    /// # Errors
    /// `SourceError::InvalidRange` if `from > to`; `SourceError::Transient`
    /// on network failures or upstream 5xx.
    async fn fetch_events(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, SourceError>;
}

/// Floor price discovery for an edition group.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Best known ask for the group, or `None` if the group has no
    /// current listings upstream.
    async fn floor_price(&self, group_id: &GroupId) -> Result<Option<Decimal>, SourceError>;
}

/// Durable listing state, the source of truth across restarts.
///
/// Every mutation is a single-record, single-statement operation so that
/// interleaving between the poller and the verification sweep is always
/// safe; there are no read-modify-write races to guard.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Insert or fully overwrite the record for `listing.item_id`.
    ///
    /// Idempotent, last-writer-wins. Used when an "available" event
    /// starts a new listing cycle, which legitimately resets every field
    /// including a stale `buyer_ref` from a previous cycle.
    async fn upsert(&self, listing: &Listing) -> Result<(), StoreError>;

    /// Mark the listing sold. Records `buyer_ref` only when supplied;
    /// a partial update never nulls out a previously known buyer.
    async fn mark_sold(&self, item_id: &ItemId, buyer_ref: Option<&str>)
        -> Result<(), StoreError>;

    /// Mark the listing unlisted and clear any buyer attribution.
    async fn mark_unlisted(&self, item_id: &ItemId) -> Result<(), StoreError>;

    /// Record a late buyer identity on an already-Sold listing.
    async fn set_buyer(&self, item_id: &ItemId, buyer_ref: &str) -> Result<(), StoreError>;

    async fn get(&self, item_id: &ItemId) -> Result<Option<Listing>, StoreError>;

    /// Resolve the Active listing carrying this exact ref, if any.
    async fn find_by_listing_ref(
        &self,
        listing_ref: &ListingRef,
    ) -> Result<Option<Listing>, StoreError>;

    /// Active listings, optionally restricted to those listed before
    /// `older_than`. Used by the verification sweep.
    async fn query_active(
        &self,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError>;

    /// Delete terminal (sold/unlisted) records not updated within the
    /// retention window. Returns the number of rows removed.
    async fn purge_older_than(&self, retention: Duration) -> Result<usize, StoreError>;
}

/// Last-processed ledger position, persisted across restarts.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<u64>, StoreError>;

    /// Persist a new height. Heights only move forward; callers never
    /// store a lower value except by explicit operator action.
    async fn store(&self, name: &str, height: u64) -> Result<(), StoreError>;
}

/// Best-effort buyer identity lookup for a sale observed without one.
///
/// Upstream heuristics (nearby deposit events, transaction payer) are
/// approximate; failure to resolve is normal and never affects the Sold
/// status already recorded.
#[async_trait]
pub trait BuyerResolver: Send + Sync {
    async fn resolve(
        &self,
        item_id: &ItemId,
        height: u64,
    ) -> Result<Option<String>, SourceError>;
}
