//! Exchange-agnostic marketplace domain: identifiers, ledger events,
//! and the listing lifecycle model.

pub mod event;
pub mod id;
pub mod listing;

pub use event::{
    decode, DomainEvent, EventKind, ListingAvailable, ListingCompleted, ListingRemoved, RawEvent,
};
pub use id::{GroupId, ItemId, ListingRef};
pub use listing::{deal_percent, is_valid_price, Listing, ListingStatus};
