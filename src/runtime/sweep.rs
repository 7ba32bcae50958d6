//! Verification sweep: the consistency backstop.
//!
//! The primary poller can miss events because the upstream silently
//! drops ranges. On a slower cadence, the sweep re-derives the true
//! status of long-Active listings by re-querying completed/removed
//! events in the window since each listing was observed, applying the
//! same exact-ref matching rules through the engine. Also hosts
//! retention housekeeping for terminal records.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::{decode, DomainEvent, EventKind, Listing};
use crate::engine::{Outcome, ReconciliationEngine};
use crate::error::Error;
use crate::port::{EventSource, ListingStore};

/// Sweep tuning knobs.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    /// Sweep cadence.
    pub interval: std::time::Duration,
    /// Only listings Active for at least this long are re-derived.
    pub min_age: chrono::Duration,
    /// Listings verified concurrently per batch; batches are separated
    /// by `batch_delay` to respect upstream rate limits.
    pub batch_size: usize,
    pub batch_delay: std::time::Duration,
    /// Retention window for sold/unlisted records.
    pub retention: chrono::Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(300),
            min_age: chrono::Duration::minutes(10),
            batch_size: 4,
            batch_delay: std::time::Duration::from_millis(500),
            retention: chrono::Duration::days(14),
        }
    }
}

/// Result of one sweep pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepSummary {
    pub examined: usize,
    pub corrected: usize,
    pub purged: usize,
}

/// Slow-cadence re-derivation of uncertain listing state.
pub struct VerificationSweep {
    source: Arc<dyn EventSource>,
    engine: Arc<ReconciliationEngine>,
    store: Arc<dyn ListingStore>,
    settings: SweepSettings,
}

impl VerificationSweep {
    #[must_use]
    pub fn new(
        source: Arc<dyn EventSource>,
        engine: Arc<ReconciliationEngine>,
        store: Arc<dyn ListingStore>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            source,
            engine,
            store,
            settings,
        }
    }

    /// Run the sweep loop forever. Failures are logged and retried next
    /// tick; the sweep never stops the host.
    pub async fn run(self) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(summary) => {
                    if summary.examined > 0 || summary.purged > 0 {
                        info!(
                            examined = summary.examined,
                            corrected = summary.corrected,
                            purged = summary.purged,
                            "Verification sweep complete"
                        );
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Verification sweep failed");
                }
            }
        }
    }

    /// One sweep pass. Public for deterministic tests.
    ///
    /// # Errors
    /// Propagates failures reading the ledger height or the store; the
    /// per-listing re-queries degrade to skips instead.
    pub async fn sweep_once(&self) -> Result<SweepSummary, Error> {
        let current = self.source.current_height().await?;
        let cutoff = Utc::now() - self.settings.min_age;
        let stale = self.store.query_active(Some(cutoff)).await?;

        let mut summary = SweepSummary::default();
        let batch_size = self.settings.batch_size.max(1);
        let mut chunks = stale.chunks(batch_size).peekable();

        while let Some(chunk) = chunks.next() {
            let verifications: Vec<_> = chunk
                .iter()
                .map(|listing| self.verify_listing(listing, current))
                .collect();
            let corrections: Vec<bool> = stream::iter(verifications)
                .buffer_unordered(batch_size)
                .collect()
                .await;

            summary.examined += corrections.len();
            summary.corrected += corrections.iter().filter(|c| **c).count();

            if chunks.peek().is_some() {
                sleep(self.settings.batch_delay).await;
            }
        }

        match self.store.purge_older_than(self.settings.retention).await {
            Ok(purged) => summary.purged = purged,
            Err(err) => warn!(error = %err, "Retention purge failed"),
        }

        Ok(summary)
    }

    /// Re-derive one listing's status from the ledger. Returns true if
    /// a missed terminal event was found and applied.
    async fn verify_listing(&self, listing: &Listing, current: u64) -> bool {
        let Some(listing_ref) = &listing.listing_ref else {
            return false;
        };
        let from = listing.listed_height;
        if from > current {
            return false;
        }

        for kind in [EventKind::ListingCompleted, EventKind::ListingRemoved] {
            let events = match self.source.fetch_events(kind, from, current).await {
                Ok(events) => events,
                Err(err) => {
                    debug!(
                        item = %listing.item_id,
                        kind = %kind,
                        error = %err,
                        "Sweep re-query failed, will retry next pass"
                    );
                    continue;
                }
            };

            for raw in &events {
                let event = decode(raw);
                let matches = match &event {
                    DomainEvent::Completed(ev) => ev.listing_ref.as_ref() == Some(listing_ref),
                    DomainEvent::Removed(ev) => ev.listing_ref.as_ref() == Some(listing_ref),
                    _ => false,
                };
                if !matches {
                    continue;
                }

                if self.engine.apply(&event).await == Outcome::Applied {
                    info!(
                        item = %listing.item_id,
                        listing_ref = %listing_ref,
                        kind = %kind,
                        "Sweep corrected a missed event"
                    );
                    return true;
                }
            }
        }

        false
    }
}
