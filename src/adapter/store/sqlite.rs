//! SQLite store implementations using Diesel.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use crate::db::model::{CheckpointRow, ListingRow};
use crate::db::schema::{checkpoints, listings};
use crate::db::DbPool;
use crate::domain::{GroupId, ItemId, Listing, ListingRef, ListingStatus};
use crate::error::StoreError;
use crate::port::{CheckpointStore, ListingStore};

/// SQLite-backed listing store.
pub struct SqliteListingStore {
    pool: DbPool,
}

impl SqliteListingStore {
    /// Create a new SQLite listing store.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<
        diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>,
        StoreError,
    > {
        self.pool
            .get()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    fn to_row(listing: &Listing) -> ListingRow {
        ListingRow {
            item_id: listing.item_id.to_string(),
            listing_ref: listing.listing_ref.as_ref().map(ToString::to_string),
            group_id: listing.group_id.to_string(),
            price: listing.price.to_string(),
            status: listing.status.as_str().to_string(),
            seller_ref: listing.seller_ref.clone(),
            buyer_ref: listing.buyer_ref.clone(),
            deal_percent: listing.deal_percent.map(|d| d.to_string()),
            listed_height: listing.listed_height as i64,
            listed_at: listing.listed_at.to_rfc3339(),
            updated_at: listing.updated_at.to_rfc3339(),
        }
    }

    fn from_row(row: ListingRow) -> Result<Listing, StoreError> {
        let status = ListingStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Parse(format!("unknown status: {}", row.status)))?;
        let price = row
            .price
            .parse()
            .map_err(|e: rust_decimal::Error| StoreError::Parse(e.to_string()))?;
        let deal_percent = row
            .deal_percent
            .map(|d| d.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StoreError::Parse(e.to_string()))?;

        Ok(Listing {
            item_id: ItemId::from(row.item_id),
            listing_ref: row.listing_ref.map(ListingRef::from),
            group_id: GroupId::from(row.group_id),
            price,
            status,
            seller_ref: row.seller_ref,
            buyer_ref: row.buyer_ref,
            deal_percent,
            listed_height: row.listed_height.max(0) as u64,
            listed_at: parse_timestamp(&row.listed_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Parse(e.to_string()))
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn upsert(&self, listing: &Listing) -> Result<(), StoreError> {
        let row = Self::to_row(listing);
        let mut conn = self.conn()?;

        diesel::replace_into(listings::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn mark_sold(
        &self,
        item_id: &ItemId,
        buyer_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let target = listings::table.find(item_id.to_string());

        // Single statement per shape; a missing buyer never nulls out a
        // previously recorded one.
        let result = match buyer_ref {
            Some(buyer) => diesel::update(target)
                .set((
                    listings::status.eq(ListingStatus::Sold.as_str()),
                    listings::buyer_ref.eq(buyer),
                    listings::updated_at.eq(&now),
                ))
                .execute(&mut conn),
            None => diesel::update(target)
                .set((
                    listings::status.eq(ListingStatus::Sold.as_str()),
                    listings::updated_at.eq(&now),
                ))
                .execute(&mut conn),
        };

        result.map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_unlisted(&self, item_id: &ItemId) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        diesel::update(listings::table.find(item_id.to_string()))
            .set((
                listings::status.eq(ListingStatus::Unlisted.as_str()),
                listings::buyer_ref.eq(None::<String>),
                listings::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn set_buyer(&self, item_id: &ItemId, buyer_ref: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        diesel::update(
            listings::table
                .find(item_id.to_string())
                .filter(listings::status.eq(ListingStatus::Sold.as_str())),
        )
        .set((
            listings::buyer_ref.eq(buyer_ref),
            listings::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, item_id: &ItemId) -> Result<Option<Listing>, StoreError> {
        let mut conn = self.conn()?;

        let row: Option<ListingRow> = listings::table
            .find(item_id.to_string())
            .first(&mut conn)
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(Self::from_row).transpose()
    }

    async fn find_by_listing_ref(
        &self,
        listing_ref: &ListingRef,
    ) -> Result<Option<Listing>, StoreError> {
        let mut conn = self.conn()?;

        let row: Option<ListingRow> = listings::table
            .filter(listings::listing_ref.eq(listing_ref.as_str()))
            .filter(listings::status.eq(ListingStatus::Active.as_str()))
            .first(&mut conn)
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(Self::from_row).transpose()
    }

    async fn query_active(
        &self,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Listing>, StoreError> {
        let mut conn = self.conn()?;

        let rows: Vec<ListingRow> = match older_than {
            Some(cutoff) => listings::table
                .filter(listings::status.eq(ListingStatus::Active.as_str()))
                .filter(listings::listed_at.lt(cutoff.to_rfc3339()))
                .load(&mut conn)
                .map_err(|e| StoreError::Database(e.to_string()))?,
            None => listings::table
                .filter(listings::status.eq(ListingStatus::Active.as_str()))
                .load(&mut conn)
                .map_err(|e| StoreError::Database(e.to_string()))?,
        };

        rows.into_iter().map(Self::from_row).collect()
    }

    async fn purge_older_than(&self, retention: Duration) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let cutoff = (Utc::now() - retention).to_rfc3339();

        let deleted = diesel::delete(
            listings::table
                .filter(listings::status.ne(ListingStatus::Active.as_str()))
                .filter(listings::updated_at.lt(cutoff)),
        )
        .execute(&mut conn)
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(deleted)
    }
}

/// SQLite-backed checkpoint store.
pub struct SqliteCheckpointStore {
    pool: DbPool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, name: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let row: Option<CheckpointRow> = checkpoints::table
            .find(name)
            .first(&mut conn)
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(row.map(|r| r.last_height.max(0) as u64))
    }

    async fn store(&self, name: &str, height: u64) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let row = CheckpointRow {
            name: name.to_string(),
            last_height: height as i64,
            updated_at: Utc::now().to_rfc3339(),
        };

        diesel::replace_into(checkpoints::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use rust_decimal_macros::dec;

    fn setup_test_db() -> DbPool {
        let pool = create_pool(":memory:").expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        pool
    }

    fn make_listing(item: &str, listing_ref: &str, price: rust_decimal::Decimal) -> Listing {
        let now = Utc::now();
        Listing {
            item_id: ItemId::new(item),
            listing_ref: Some(ListingRef::new(listing_ref)),
            group_id: GroupId::new("edition-1"),
            price,
            status: ListingStatus::Active,
            seller_ref: Some("0xseller".to_string()),
            buyer_ref: None,
            deal_percent: Some(dec!(12.5)),
            listed_height: 100,
            listed_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn sqlite_listing_roundtrip() {
        let store = SqliteListingStore::new(setup_test_db());
        let listing = make_listing("nft-1", "lst-1", dec!(35));

        store.upsert(&listing).await.unwrap();
        let loaded = store.get(&ItemId::new("nft-1")).await.unwrap().unwrap();

        assert_eq!(loaded.item_id, listing.item_id);
        assert_eq!(loaded.price, dec!(35));
        assert_eq!(loaded.status, ListingStatus::Active);
        assert_eq!(loaded.deal_percent, Some(dec!(12.5)));
        assert_eq!(loaded.listed_height, 100);
    }

    #[tokio::test]
    async fn upsert_is_last_writer_wins() {
        let store = SqliteListingStore::new(setup_test_db());

        store
            .upsert(&make_listing("nft-1", "lst-1", dec!(35)))
            .await
            .unwrap();
        store
            .upsert(&make_listing("nft-1", "lst-2", dec!(30)))
            .await
            .unwrap();

        let loaded = store.get(&ItemId::new("nft-1")).await.unwrap().unwrap();
        assert_eq!(loaded.listing_ref.unwrap().as_str(), "lst-2");
        assert_eq!(loaded.price, dec!(30));
    }

    #[tokio::test]
    async fn mark_sold_without_buyer_keeps_row_sold_with_null_buyer() {
        let store = SqliteListingStore::new(setup_test_db());
        store
            .upsert(&make_listing("nft-1", "lst-1", dec!(35)))
            .await
            .unwrap();

        store.mark_sold(&ItemId::new("nft-1"), None).await.unwrap();

        let loaded = store.get(&ItemId::new("nft-1")).await.unwrap().unwrap();
        assert_eq!(loaded.status, ListingStatus::Sold);
        assert!(loaded.buyer_ref.is_none());
    }

    #[tokio::test]
    async fn set_buyer_backfills_only_sold_rows() {
        let store = SqliteListingStore::new(setup_test_db());
        store
            .upsert(&make_listing("nft-1", "lst-1", dec!(35)))
            .await
            .unwrap();

        // Active row is untouched by a buyer backfill.
        store
            .set_buyer(&ItemId::new("nft-1"), "0xbuyer")
            .await
            .unwrap();
        let loaded = store.get(&ItemId::new("nft-1")).await.unwrap().unwrap();
        assert!(loaded.buyer_ref.is_none());

        store.mark_sold(&ItemId::new("nft-1"), None).await.unwrap();
        store
            .set_buyer(&ItemId::new("nft-1"), "0xbuyer")
            .await
            .unwrap();
        let loaded = store.get(&ItemId::new("nft-1")).await.unwrap().unwrap();
        assert_eq!(loaded.buyer_ref.as_deref(), Some("0xbuyer"));
    }

    #[tokio::test]
    async fn find_by_listing_ref_matches_active_only() {
        let store = SqliteListingStore::new(setup_test_db());
        store
            .upsert(&make_listing("nft-1", "lst-1", dec!(35)))
            .await
            .unwrap();

        let found = store
            .find_by_listing_ref(&ListingRef::new("lst-1"))
            .await
            .unwrap();
        assert!(found.is_some());

        store.mark_sold(&ItemId::new("nft-1"), None).await.unwrap();
        let found = store
            .find_by_listing_ref(&ListingRef::new("lst-1"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn query_active_respects_age_filter() {
        let store = SqliteListingStore::new(setup_test_db());

        let mut old = make_listing("nft-old", "lst-old", dec!(10));
        old.listed_at = Utc::now() - Duration::hours(2);
        store.upsert(&old).await.unwrap();
        store
            .upsert(&make_listing("nft-new", "lst-new", dec!(20)))
            .await
            .unwrap();

        let all = store.query_active(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let cutoff = Utc::now() - Duration::hours(1);
        let stale = store.query_active(Some(cutoff)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].item_id.as_str(), "nft-old");
    }

    #[tokio::test]
    async fn purge_removes_only_stale_terminal_rows() {
        let store = SqliteListingStore::new(setup_test_db());

        store
            .upsert(&make_listing("nft-active", "lst-a", dec!(10)))
            .await
            .unwrap();

        let mut sold = make_listing("nft-sold", "lst-s", dec!(10));
        sold.status = ListingStatus::Sold;
        sold.updated_at = Utc::now() - Duration::days(30);
        store.upsert(&sold).await.unwrap();

        let purged = store.purge_older_than(Duration::days(7)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(&ItemId::new("nft-sold")).await.unwrap().is_none());
        assert!(store
            .get(&ItemId::new("nft-active"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteCheckpointStore::new(setup_test_db());

        assert_eq!(store.load("watcher").await.unwrap(), None);
        store.store("watcher", 105).await.unwrap();
        assert_eq!(store.load("watcher").await.unwrap(), Some(105));
        store.store("watcher", 110).await.unwrap();
        assert_eq!(store.load("watcher").await.unwrap(), Some(110));
    }
}
