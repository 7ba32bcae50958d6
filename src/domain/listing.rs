//! Listing lifecycle model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::id::{GroupId, ItemId, ListingRef};

/// Lifecycle status of a listing. Exactly one holds at a time.
///
/// Sold and Unlisted are terminal for a listing cycle; a fresh
/// "available" event for the same item always starts a new cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
    Unlisted,
}

impl ListingStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Unlisted => "unlisted",
        }
    }

    /// Parse a stored status string. Unknown values return `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "sold" => Some(ListingStatus::Sold),
            "unlisted" => Some(ListingStatus::Unlisted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One traded item currently or previously offered for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub item_id: ItemId,
    pub listing_ref: Option<ListingRef>,
    pub group_id: GroupId,
    pub price: Decimal,
    pub status: ListingStatus,
    pub seller_ref: Option<String>,
    pub buyer_ref: Option<String>,
    /// Percent below floor at listing time. Positive means a deal.
    pub deal_percent: Option<Decimal>,
    /// Ledger height the listing was observed at; bounds the
    /// verification sweep's re-derivation window.
    pub listed_height: u64,
    pub listed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Percent below floor for an ask price. Positive means below floor.
///
/// Returns `None` for a non-positive floor (no meaningful signal).
#[must_use]
pub fn deal_percent(floor: Decimal, price: Decimal) -> Option<Decimal> {
    if floor <= Decimal::ZERO {
        return None;
    }
    Some((floor - price) / floor * dec!(100))
}

/// The upstream marketplace only permits integral pricing; fractional
/// prices indicate a different, unsupported marketplace.
#[must_use]
pub fn is_valid_price(price: Decimal) -> bool {
    price > Decimal::ZERO && price.fract().is_zero()
}
