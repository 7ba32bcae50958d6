//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{checkpoints, listings};

/// Database row for a listing.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = listings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ListingRow {
    pub item_id: String,
    pub listing_ref: Option<String>,
    pub group_id: String,
    pub price: String,
    pub status: String,
    pub seller_ref: Option<String>,
    pub buyer_ref: Option<String>,
    pub deal_percent: Option<String>,
    pub listed_height: i64,
    pub listed_at: String,
    pub updated_at: String,
}

/// Database row for a poller checkpoint.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = checkpoints)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CheckpointRow {
    pub name: String,
    pub last_height: i64,
    pub updated_at: String,
}
