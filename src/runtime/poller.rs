//! Checkpointed polling loop driving the reconciliation engine.

use std::sync::Arc;

use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};

use crate::domain::{decode, EventKind};
use crate::engine::{OutcomeTally, ReconciliationEngine};
use crate::error::{Error, StoreError};
use crate::port::{CheckpointStore, EventSource};

use super::backoff::{Backoff, BackoffPolicy};

/// Name of the poller's checkpoint row.
pub const WATCHER_CHECKPOINT: &str = "watcher";

/// Poller tuning knobs.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Poll cadence.
    pub interval: std::time::Duration,
    /// Widest height range queried in one cycle.
    pub max_batch_heights: u64,
    /// First-run checkpoint initialization: `current - start_offset`.
    pub start_offset: u64,
    /// Log a heartbeat every Nth idle tick. Zero disables.
    pub heartbeat_every: u32,
    /// Backoff for transient upstream failures.
    pub backoff: BackoffPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(5),
            max_batch_heights: 200,
            start_offset: 50,
            heartbeat_every: 60,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Result of one poll cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollSummary {
    /// Height range queried, `None` when the ledger had nothing new.
    pub range: Option<(u64, u64)>,
    pub tally: OutcomeTally,
}

/// Periodic poller: fetches new events since the checkpoint and feeds
/// them to the engine in lifecycle order.
pub struct Poller {
    source: Arc<dyn EventSource>,
    engine: Arc<ReconciliationEngine>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: PollerSettings,
    idle_ticks: u32,
}

impl Poller {
    #[must_use]
    pub fn new(
        source: Arc<dyn EventSource>,
        engine: Arc<ReconciliationEngine>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            source,
            engine,
            checkpoints,
            settings,
            idle_ticks: 0,
        }
    }

    /// Run the poll loop forever. Transient upstream failures back off
    /// and retry without advancing the checkpoint; the watcher never
    /// permanently stops.
    pub async fn run(mut self) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff = Backoff::new(self.settings.backoff.clone());

        loop {
            ticker.tick().await;

            match self.poll_once().await {
                Ok(summary) => {
                    backoff.reset();
                    if let Some((from, to)) = summary.range {
                        info!(
                            from,
                            to,
                            applied = summary.tally.applied,
                            unmatched = summary.tally.unmatched,
                            unrecognized = summary.tally.unrecognized,
                            dropped = summary.tally.dropped,
                            "Poll cycle complete"
                        );
                    }
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %err,
                        failures = backoff.failures(),
                        delay_ms = delay.as_millis() as u64,
                        "Poll failed, backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// One poll cycle. Public for driving the loop deterministically in
    /// tests.
    ///
    /// # Errors
    /// Propagates source failures and checkpoint load failures; the
    /// checkpoint is not advanced in either case.
    pub async fn poll_once(&mut self) -> Result<PollSummary, Error> {
        let current = self.source.current_height().await?;
        let checkpoint = self.load_or_init_checkpoint(current).await?;

        if current <= checkpoint {
            self.idle_ticks += 1;
            if self.settings.heartbeat_every > 0
                && self.idle_ticks % self.settings.heartbeat_every == 0
            {
                info!(height = current, "Watcher idle, ledger has not advanced");
            }
            return Ok(PollSummary::default());
        }
        self.idle_ticks = 0;

        let from = checkpoint + 1;
        let to = current.min(checkpoint + self.settings.max_batch_heights);

        // Availables first so a same-batch relist-then-complete resolves
        // against the new cycle, not the old one.
        let mut tally = OutcomeTally::default();
        for kind in EventKind::ALL {
            let events = self.source.fetch_events(kind, from, to).await?;
            for raw in &events {
                let event = decode(raw);
                tally.record(self.engine.apply(&event).await);
            }
        }

        // Individual decode/match failures never block progress; the
        // checkpoint advances to the queried upper bound regardless.
        if let Err(err) = self.checkpoints.store(WATCHER_CHECKPOINT, to).await {
            warn!(error = %err, height = to, "Failed to persist checkpoint");
        }

        Ok(PollSummary {
            range: Some((from, to)),
            tally,
        })
    }

    /// Load the checkpoint, seeding it on first run. A load failure
    /// fails the whole cycle: falling back to a guessed position could
    /// later persist a height below the real checkpoint, and heights
    /// only move forward.
    async fn load_or_init_checkpoint(&self, current: u64) -> Result<u64, StoreError> {
        match self.checkpoints.load(WATCHER_CHECKPOINT).await? {
            Some(height) => Ok(height),
            None => {
                let initial = current.saturating_sub(self.settings.start_offset);
                info!(height = initial, "Initializing checkpoint");
                if let Err(err) = self.checkpoints.store(WATCHER_CHECKPOINT, initial).await {
                    warn!(error = %err, "Failed to persist initial checkpoint");
                }
                Ok(initial)
            }
        }
    }
}
