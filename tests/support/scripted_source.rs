use async_trait::async_trait;
use chrono::{DateTime, Utc};
use floorwatch::domain::{EventKind, RawEvent};
use floorwatch::error::SourceError;
use floorwatch::port::EventSource;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Deterministic test double for the ledger event API.
#[derive(Default)]
pub struct ScriptedEventSource {
    height: Mutex<u64>,
    events: Mutex<Vec<RawEvent>>,
    fail_fetches: Mutex<u32>,
    fetch_calls: Mutex<u32>,
}

impl ScriptedEventSource {
    pub fn new(height: u64) -> Self {
        Self {
            height: Mutex::new(height),
            ..Default::default()
        }
    }

    pub fn set_height(&self, height: u64) {
        *self.height.lock() = height;
    }

    /// Fail the next `n` fetch calls with a transient error.
    pub fn fail_next_fetches(&self, n: u32) {
        *self.fail_fetches.lock() = n;
    }

    pub fn fetch_calls(&self) -> u32 {
        *self.fetch_calls.lock()
    }

    pub fn push_raw(&self, kind: &str, height: u64, at: DateTime<Utc>, payload: Value) {
        self.events.lock().push(RawEvent {
            kind: kind.to_string(),
            height,
            at,
            payload,
        });
    }

    pub fn push_available(
        &self,
        height: u64,
        item: &str,
        listing_ref: &str,
        group: &str,
        price: &str,
    ) {
        self.push_raw(
            "ListingAvailable",
            height,
            Utc::now(),
            json!({
                "item_id": item,
                "listing_ref": listing_ref,
                "group_id": group,
                "price": price,
                "seller": "0xseller"
            }),
        );
    }

    pub fn push_completed(&self, height: u64, listing_ref: &str, purchased: bool) {
        self.push_raw(
            "ListingCompleted",
            height,
            Utc::now(),
            json!({ "listing_ref": listing_ref, "purchased": purchased }),
        );
    }

    pub fn push_removed(&self, height: u64, listing_ref: &str) {
        self.push_raw(
            "ListingRemoved",
            height,
            Utc::now(),
            json!({ "listing_ref": listing_ref }),
        );
    }
}

#[async_trait]
impl EventSource for ScriptedEventSource {
    async fn current_height(&self) -> Result<u64, SourceError> {
        Ok(*self.height.lock())
    }

    async fn fetch_events(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawEvent>, SourceError> {
        *self.fetch_calls.lock() += 1;

        {
            let mut failures = self.fail_fetches.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(SourceError::Transient("scripted failure".into()));
            }
        }

        if from > to {
            return Err(SourceError::InvalidRange { from, to });
        }

        Ok(self
            .events
            .lock()
            .iter()
            .filter(|ev| ev.kind == kind.as_str() && ev.height >= from && ev.height <= to)
            .cloned()
            .collect())
    }
}
