//! Shared test doubles and fixtures.

#![allow(dead_code)]

pub mod prices;
pub mod scripted_source;
pub mod stores;
pub mod temp_db;

use std::sync::Arc;

use floorwatch::engine::{EngineSettings, FloorPriceCache, ReconciliationEngine};
use floorwatch::port::{ListingStore, PriceSource};

/// Build an engine over the given store with fixed floor prices and no
/// buyer resolver.
pub fn make_engine(
    store: Arc<dyn ListingStore>,
    prices: &[(&str, rust_decimal::Decimal)],
) -> (Arc<ReconciliationEngine>, Arc<FloorPriceCache>) {
    let source: Arc<dyn PriceSource> = Arc::new(prices::FixedPriceSource::new(prices));
    let floor = Arc::new(FloorPriceCache::new(
        source,
        chrono::Duration::minutes(5),
        64,
    ));
    let engine = Arc::new(ReconciliationEngine::new(
        store,
        Arc::clone(&floor),
        None,
        EngineSettings::default(),
    ));
    (engine, floor)
}
