//! Reconciliation engine: the listing lifecycle state machine.
//!
//! Consumes decoded ledger events, keeps the durable listing store and
//! the in-memory working set consistent, computes deal percent against
//! the floor price cache, and deduplicates re-listings. The engine is
//! the single writer of listing state; the poller and the verification
//! sweep both feed it, and every store mutation is a single-record
//! atomic operation so interleaving between the two drivers is safe.

pub mod backfill;
pub mod cache;
pub mod floor;

pub use floor::FloorPriceCache;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::domain::{
    deal_percent, is_valid_price, DomainEvent, ItemId, Listing, ListingAvailable,
    ListingCompleted, ListingRef, ListingRemoved, ListingStatus,
};
use crate::error::StoreError;
use crate::port::{BuyerResolver, ListingStore};

use backfill::spawn_buyer_backfill;
use cache::BoundedMap;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// A completed/removed event timestamped earlier than the matched
    /// listing's `listed_at` minus this tolerance refers to a previous
    /// listing cycle and is discarded. Heuristic for clock/ordering
    /// skew, not an upstream invariant.
    pub completed_tolerance: Duration,
    /// Capacity of the in-memory active working set.
    pub working_set_capacity: usize,
    /// Capacity of the terminal-marker cache.
    pub terminal_capacity: usize,
    /// Bounded retries for store writes before dropping an event. The
    /// verification sweep self-heals anything dropped here.
    pub write_retries: u32,
    /// Broadcast capacity for the enriched listing feed.
    pub feed_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            completed_tolerance: Duration::seconds(120),
            working_set_capacity: 4096,
            terminal_capacity: 4096,
            write_retries: 3,
            feed_capacity: 256,
        }
    }
}

/// What happened to one event. Skips are normal given upstream noise;
/// only `Dropped` indicates a local persistence failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Non-positive or fractional price; unsupported marketplace.
    SkippedInvalidPrice,
    /// No floor price could be determined for the group.
    SkippedNoFloor,
    /// No Active listing carries the event's listing ref.
    SkippedUnmatched,
    /// Event predates the matched listing cycle (timing guard).
    SkippedStale,
    /// Payload decoded to no known shape.
    SkippedUnrecognized,
    /// Store writes exhausted their retries; the sweep will self-heal.
    Dropped,
}

/// Per-cycle outcome counters, logged by the poller.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeTally {
    pub applied: u64,
    pub invalid_price: u64,
    pub no_floor: u64,
    pub unmatched: u64,
    pub stale: u64,
    pub unrecognized: u64,
    pub dropped: u64,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::SkippedInvalidPrice => self.invalid_price += 1,
            Outcome::SkippedNoFloor => self.no_floor += 1,
            Outcome::SkippedUnmatched => self.unmatched += 1,
            Outcome::SkippedStale => self.stale += 1,
            Outcome::SkippedUnrecognized => self.unrecognized += 1,
            Outcome::Dropped => self.dropped += 1,
        }
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.applied
            + self.invalid_price
            + self.no_floor
            + self.unmatched
            + self.stale
            + self.unrecognized
            + self.dropped
    }
}

struct ActiveEntry {
    listing_ref: ListingRef,
    listed_at: DateTime<Utc>,
}

struct TerminalMark {
    status: ListingStatus,
}

/// The listing lifecycle state machine.
pub struct ReconciliationEngine {
    store: Arc<dyn ListingStore>,
    floor: Arc<FloorPriceCache>,
    resolver: Option<Arc<dyn BuyerResolver>>,
    working: Mutex<BoundedMap<ItemId, ActiveEntry>>,
    terminal: Mutex<BoundedMap<ItemId, TerminalMark>>,
    feed: broadcast::Sender<Listing>,
    settings: EngineSettings,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn ListingStore>,
        floor: Arc<FloorPriceCache>,
        resolver: Option<Arc<dyn BuyerResolver>>,
        settings: EngineSettings,
    ) -> Self {
        let (feed, _) = broadcast::channel(settings.feed_capacity.max(1));
        Self {
            working: Mutex::new(BoundedMap::new(settings.working_set_capacity)),
            terminal: Mutex::new(BoundedMap::new(settings.terminal_capacity)),
            store,
            floor,
            resolver,
            feed,
            settings,
        }
    }

    /// Subscribe to the enriched listing feed (consumed by the host's
    /// status/listing-feed endpoint).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Listing> {
        self.feed.subscribe()
    }

    /// Apply one decoded event. Never errors: every failure path
    /// degrades to a counted skip.
    pub async fn apply(&self, event: &DomainEvent) -> Outcome {
        match event {
            DomainEvent::Available(ev) => self.handle_available(ev).await,
            DomainEvent::Completed(ev) => self.handle_completed(ev).await,
            DomainEvent::Removed(ev) => self.handle_removed(ev).await,
            DomainEvent::Unrecognized => Outcome::SkippedUnrecognized,
        }
    }

    async fn handle_available(&self, ev: &ListingAvailable) -> Outcome {
        if !is_valid_price(ev.price) {
            debug!(item = %ev.item_id, price = %ev.price, "Rejected non-integral price");
            return Outcome::SkippedInvalidPrice;
        }

        let Some(floor) = self.floor.get(&ev.group_id).await else {
            debug!(item = %ev.item_id, group = %ev.group_id, "No floor price, dropping listing");
            return Outcome::SkippedNoFloor;
        };
        let Some(deal) = deal_percent(floor, ev.price) else {
            return Outcome::SkippedNoFloor;
        };

        // Repeat delivery of the same ref within the polling window is
        // an update in place, not a new cycle.
        let repeat_listed_at = {
            let working = self.working.lock();
            working
                .get(&ev.item_id)
                .filter(|entry| entry.listing_ref == ev.listing_ref)
                .map(|entry| entry.listed_at)
        };
        let listed_at = repeat_listed_at.unwrap_or(ev.at);

        if repeat_listed_at.is_none() {
            // Re-listing: any prior Sold/Unlisted mark for this item is
            // obsolete the moment a new cycle starts.
            self.terminal.lock().remove(&ev.item_id);
            self.working.lock().insert(
                ev.item_id.clone(),
                ActiveEntry {
                    listing_ref: ev.listing_ref.clone(),
                    listed_at,
                },
            );
        }

        let listing = Listing {
            item_id: ev.item_id.clone(),
            listing_ref: Some(ev.listing_ref.clone()),
            group_id: ev.group_id.clone(),
            price: ev.price,
            status: ListingStatus::Active,
            seller_ref: ev.seller_ref.clone(),
            buyer_ref: None,
            deal_percent: Some(deal),
            listed_height: ev.height,
            listed_at,
            updated_at: Utc::now(),
        };

        if self
            .persist("upsert", || self.store.upsert(&listing))
            .await
            .is_err()
        {
            return Outcome::Dropped;
        }

        if ev.price < floor {
            self.floor.update(&ev.group_id, ev.price);
        }

        let _ = self.feed.send(listing);
        Outcome::Applied
    }

    async fn handle_completed(&self, ev: &ListingCompleted) -> Outcome {
        // Matching by item id alone is explicitly unsafe: an item may
        // have been sold and relisted several times. Only an exact ref
        // match against an Active listing is accepted.
        let Some(listing_ref) = &ev.listing_ref else {
            return Outcome::SkippedUnmatched;
        };
        let Some((item_id, listed_at)) = self.resolve_active(listing_ref).await else {
            return Outcome::SkippedUnmatched;
        };

        if ev.at < listed_at - self.settings.completed_tolerance {
            debug!(
                item = %item_id,
                listing_ref = %listing_ref,
                event_at = %ev.at,
                listed_at = %listed_at,
                "Completion predates listing cycle, discarding"
            );
            return Outcome::SkippedStale;
        }

        if ev.purchased {
            if self
                .persist("mark_sold", || {
                    self.store.mark_sold(&item_id, ev.buyer_ref.as_deref())
                })
                .await
                .is_err()
            {
                return Outcome::Dropped;
            }
            self.working.lock().remove(&item_id);
            self.terminal.lock().insert(
                item_id.clone(),
                TerminalMark {
                    status: ListingStatus::Sold,
                },
            );

            if ev.buyer_ref.is_none() {
                if let Some(resolver) = &self.resolver {
                    spawn_buyer_backfill(
                        Arc::clone(resolver),
                        Arc::clone(&self.store),
                        item_id.clone(),
                        ev.height,
                    );
                }
            }
        } else {
            if self
                .persist("mark_unlisted", || self.store.mark_unlisted(&item_id))
                .await
                .is_err()
            {
                return Outcome::Dropped;
            }
            self.working.lock().remove(&item_id);
            self.terminal.lock().insert(
                item_id.clone(),
                TerminalMark {
                    status: ListingStatus::Unlisted,
                },
            );
        }

        self.emit(&item_id).await;
        Outcome::Applied
    }

    async fn handle_removed(&self, ev: &ListingRemoved) -> Outcome {
        let Some(listing_ref) = &ev.listing_ref else {
            return Outcome::SkippedUnmatched;
        };
        let Some((item_id, _listed_at)) = self.resolve_active(listing_ref).await else {
            return Outcome::SkippedUnmatched;
        };

        if self
            .persist("mark_unlisted", || self.store.mark_unlisted(&item_id))
            .await
            .is_err()
        {
            return Outcome::Dropped;
        }
        self.working.lock().remove(&item_id);
        self.terminal.lock().insert(
            item_id.clone(),
            TerminalMark {
                status: ListingStatus::Unlisted,
            },
        );

        self.emit(&item_id).await;
        Outcome::Applied
    }

    /// Whether the item currently carries a terminal (Sold/Unlisted)
    /// marker in the fast-lookup cache.
    #[must_use]
    pub fn terminal_status(&self, item_id: &ItemId) -> Option<ListingStatus> {
        self.terminal.lock().get(item_id).map(|mark| mark.status)
    }

    /// Resolve the Active listing carrying this exact ref: working set
    /// first, durable store second.
    async fn resolve_active(
        &self,
        listing_ref: &ListingRef,
    ) -> Option<(ItemId, DateTime<Utc>)> {
        {
            let working = self.working.lock();
            if let Some((item_id, entry)) = working
                .iter()
                .find(|(_, entry)| &entry.listing_ref == listing_ref)
            {
                return Some((item_id.clone(), entry.listed_at));
            };
        }

        match self.store.find_by_listing_ref(listing_ref).await {
            Ok(Some(listing)) => Some((listing.item_id, listing.listed_at)),
            Ok(None) => None,
            Err(err) => {
                // Treated as unmatched; the sweep re-derives later.
                warn!(listing_ref = %listing_ref, error = %err, "Ref lookup failed");
                None
            }
        }
    }

    async fn emit(&self, item_id: &ItemId) {
        if let Ok(Some(listing)) = self.store.get(item_id).await {
            let _ = self.feed.send(listing);
        }
    }

    async fn persist<F, Fut>(&self, action: &'static str, mut op: F) -> Result<(), StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.settings.write_retries {
                        error!(action, error = %err, "Store write failed, dropping event");
                        return Err(err);
                    }
                    warn!(action, attempt, error = %err, "Store write failed, retrying");
                    sleep(std::time::Duration::from_millis(50 * u64::from(attempt))).await;
                }
            }
        }
    }
}
