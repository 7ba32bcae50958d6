//! Best-effort buyer-identity backfill.
//!
//! A completed event often arrives without a reliable buyer identity.
//! The exact listing-ref match is already sufficient proof of sale, so
//! the listing is marked Sold immediately and this module tries to patch
//! the buyer in afterwards. Failure to resolve is normal and never
//! reverts the Sold status.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::ItemId;
use crate::port::{BuyerResolver, ListingStore};

/// Fire-and-forget buyer resolution for a sale observed at `height`.
pub fn spawn_buyer_backfill(
    resolver: Arc<dyn BuyerResolver>,
    store: Arc<dyn ListingStore>,
    item_id: ItemId,
    height: u64,
) {
    tokio::spawn(async move {
        match resolver.resolve(&item_id, height).await {
            Ok(Some(buyer)) => {
                debug!(item = %item_id, buyer = %buyer, "Buyer resolved");
                if let Err(err) = store.set_buyer(&item_id, &buyer).await {
                    warn!(item = %item_id, error = %err, "Failed to record backfilled buyer");
                }
            }
            Ok(None) => {
                debug!(item = %item_id, "No buyer resolved for sale");
            }
            Err(err) => {
                debug!(item = %item_id, error = %err, "Buyer backfill lookup failed");
            }
        }
    });
}
