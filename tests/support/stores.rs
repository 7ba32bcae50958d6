use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use floorwatch::adapter::store::{MemoryCheckpointStore, MemoryListingStore};
use floorwatch::domain::{ItemId, Listing, ListingRef};
use floorwatch::error::StoreError;
use floorwatch::port::{CheckpointStore, ListingStore};
use parking_lot::Mutex;

/// Listing store whose writes can be made to fail on demand. Reads
/// always pass through to the inner store.
#[derive(Default)]
pub struct FlakyListingStore {
    inner: MemoryListingStore,
    write_failures: Mutex<u32>,
}

impl FlakyListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes. `u32::MAX` fails writes until reset.
    pub fn fail_writes(&self, n: u32) {
        *self.write_failures.lock() = n;
    }

    fn take_failure(&self) -> Option<StoreError> {
        let mut left = self.write_failures.lock();
        if *left > 0 {
            *left -= 1;
            Some(StoreError::Database("injected write failure".into()))
        } else {
            None
        }
    }
}

#[async_trait]
impl ListingStore for FlakyListingStore {
    async fn upsert(&self, listing: &Listing) -> Result<(), StoreError> {
        match self.take_failure() {
            Some(err) => Err(err),
            None => self.inner.upsert(listing).await,
        }
    }

    async fn mark_sold(
        &self,
        item_id: &ItemId,
        buyer_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        match self.take_failure() {
            Some(err) => Err(err),
            None => self.inner.mark_sold(item_id, buyer_ref).await,
        }
    }

    async fn mark_unlisted(&self, item_id: &ItemId) -> Result<(), StoreError> {
        match self.take_failure() {
            Some(err) => Err(err),
            None => self.inner.mark_unlisted(item_id).await,
        }
    }

    async fn set_buyer(&self, item_id: &ItemId, buyer_ref: &str) -> Result<(), StoreError> {
        match self.take_failure() {
            Some(err) => Err(err),
            None => self.inner.set_buyer(item_id, buyer_ref).await,
        }
    }

    async fn get(&self, item_id: &ItemId) -> Result<Option<Listing>, StoreError> {
        self.inner.get(item_id).await
    }

    async fn find_by_listing_ref(
        &self,
        listing_ref: &ListingRef,
    ) -> Result<Option<Listing>, StoreError> {
        self.inner.find_by_listing_ref(listing_ref).await
    }

    async fn query_active(
        &self,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError> {
        self.inner.query_active(older_than).await
    }

    async fn purge_older_than(&self, retention: Duration) -> Result<usize, StoreError> {
        self.inner.purge_older_than(retention).await
    }
}

/// Checkpoint store whose loads can be made to fail on demand.
#[derive(Default)]
pub struct FlakyCheckpointStore {
    inner: MemoryCheckpointStore,
    load_failures: Mutex<u32>,
}

impl FlakyCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_loads(&self, n: u32) {
        *self.load_failures.lock() = n;
    }
}

#[async_trait]
impl CheckpointStore for FlakyCheckpointStore {
    async fn load(&self, name: &str) -> Result<Option<u64>, StoreError> {
        {
            let mut left = self.load_failures.lock();
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Connection("injected load failure".into()));
            }
        }
        self.inner.load(name).await
    }

    async fn store(&self, name: &str, height: u64) -> Result<(), StoreError> {
        self.inner.store(name, height).await
    }
}
