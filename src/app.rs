//! Application wiring: pool, stores, engine, and the periodic tasks.

use std::sync::Arc;

use tracing::info;

use crate::adapter::store::{SqliteCheckpointStore, SqliteListingStore};
use crate::adapter::{LedgerClient, PriceClient};
use crate::config::Config;
use crate::db;
use crate::engine::{FloorPriceCache, ReconciliationEngine};
use crate::error::Result;
use crate::port::{BuyerResolver, CheckpointStore, EventSource, ListingStore, PriceSource};
use crate::runtime::{Poller, VerificationSweep};

/// Main application struct.
pub struct App;

impl App {
    /// Run the watcher: poller and verification sweep over a shared
    /// SQLite-backed listing store. Returns only if both tasks stop,
    /// which they are designed never to do; shutdown is driven by the
    /// binary's signal handling.
    pub async fn run(config: Config) -> Result<()> {
        let pool = db::create_pool(&config.store.database_url)?;
        db::run_migrations(&pool)?;

        let ledger = Arc::new(LedgerClient::from_config(&config.source)?);
        let price: Arc<dyn PriceSource> = Arc::new(PriceClient::from_config(&config.floor)?);

        let listing_store: Arc<dyn ListingStore> =
            Arc::new(SqliteListingStore::new(pool.clone()));
        let checkpoint_store: Arc<dyn CheckpointStore> =
            Arc::new(SqliteCheckpointStore::new(pool));

        let floor = Arc::new(FloorPriceCache::new(
            price,
            config.floor.ttl(),
            config.floor.capacity,
        ));

        let engine = Arc::new(ReconciliationEngine::new(
            Arc::clone(&listing_store),
            floor,
            Some(Arc::clone(&ledger) as Arc<dyn BuyerResolver>),
            config.engine.settings(),
        ));

        info!(
            database = %config.store.database_url,
            api = %config.source.api_url,
            "Watcher starting"
        );

        let poller = Poller::new(
            Arc::clone(&ledger) as Arc<dyn EventSource>,
            Arc::clone(&engine),
            checkpoint_store,
            config.poller.settings(config.source.start_offset),
        );
        let sweep = VerificationSweep::new(
            ledger as Arc<dyn EventSource>,
            engine,
            listing_store,
            config.sweep.settings(config.store.retention()),
        );

        let poll_task = tokio::spawn(poller.run());
        let sweep_task = tokio::spawn(sweep.run());

        let _ = tokio::try_join!(poll_task, sweep_task);
        Ok(())
    }
}
