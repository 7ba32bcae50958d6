//! Marketplace ledger events and their decoding.
//!
//! The ledger API returns opaque JSON payloads. [`decode`] is a total
//! function: malformed or foreign payloads come back as
//! [`DomainEvent::Unrecognized`] and are counted by the caller, never
//! propagated as errors. Downstream matching is exhaustive over the
//! tagged union so a decode ambiguity can never produce a guessed shape.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::id::{GroupId, ItemId, ListingRef};

/// Event categories tracked by the watcher, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ListingAvailable,
    ListingCompleted,
    ListingRemoved,
}

impl EventKind {
    /// All tracked kinds in the order the poller must feed them to the
    /// engine (a same-batch relist-then-complete resolves correctly only
    /// if availables land first).
    pub const ALL: [EventKind; 3] = [
        EventKind::ListingAvailable,
        EventKind::ListingCompleted,
        EventKind::ListingRemoved,
    ];

    /// Wire name used when querying the ledger event API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ListingAvailable => "ListingAvailable",
            EventKind::ListingCompleted => "ListingCompleted",
            EventKind::ListingRemoved => "ListingRemoved",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Undecoded event as returned by the ledger API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    /// Event type name as reported upstream.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ledger height the event was recorded at.
    pub height: u64,
    /// Block timestamp.
    pub at: DateTime<Utc>,
    /// Opaque event payload.
    #[serde(default)]
    pub payload: Value,
}

/// A new listing observed on the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingAvailable {
    pub item_id: ItemId,
    pub listing_ref: ListingRef,
    pub group_id: GroupId,
    pub price: Decimal,
    pub seller_ref: Option<String>,
    pub at: DateTime<Utc>,
    pub height: u64,
}

/// A listing left the marketplace; `purchased` distinguishes a sale from
/// a seller-initiated cancellation. May arrive with only a `listing_ref`
/// and without a reliable buyer identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCompleted {
    pub item_id: Option<ItemId>,
    pub listing_ref: Option<ListingRef>,
    pub purchased: bool,
    pub buyer_ref: Option<String>,
    pub at: DateTime<Utc>,
    pub height: u64,
}

/// A listing was withdrawn without a completion event.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRemoved {
    pub item_id: Option<ItemId>,
    pub listing_ref: Option<ListingRef>,
    pub at: DateTime<Utc>,
    pub height: u64,
}

/// Decoded marketplace event.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Available(ListingAvailable),
    Completed(ListingCompleted),
    Removed(ListingRemoved),
    /// Payload did not match any known shape. Counted and skipped.
    Unrecognized,
}

/// Decode a raw ledger event into the domain union.
///
/// Total and pure: never panics, never errors. Payloads from other
/// marketplaces or with missing required fields decode to
/// [`DomainEvent::Unrecognized`].
#[must_use]
pub fn decode(raw: &RawEvent) -> DomainEvent {
    match raw.kind.as_str() {
        "ListingAvailable" => decode_available(raw),
        "ListingCompleted" => decode_completed(raw),
        "ListingRemoved" => decode_removed(raw),
        _ => DomainEvent::Unrecognized,
    }
}

fn decode_available(raw: &RawEvent) -> DomainEvent {
    let payload = &raw.payload;
    let (Some(item_id), Some(listing_ref), Some(group_id)) = (
        str_field(payload, "item_id"),
        str_field(payload, "listing_ref"),
        str_field(payload, "group_id"),
    ) else {
        return DomainEvent::Unrecognized;
    };
    let Some(price) = price_field(payload) else {
        return DomainEvent::Unrecognized;
    };

    DomainEvent::Available(ListingAvailable {
        item_id: ItemId::new(item_id),
        listing_ref: ListingRef::new(listing_ref),
        group_id: GroupId::new(group_id),
        price,
        seller_ref: str_field(payload, "seller").map(str::to_string),
        at: raw.at,
        height: raw.height,
    })
}

fn decode_completed(raw: &RawEvent) -> DomainEvent {
    let payload = &raw.payload;
    let Some(purchased) = payload.get("purchased").and_then(Value::as_bool) else {
        return DomainEvent::Unrecognized;
    };

    DomainEvent::Completed(ListingCompleted {
        item_id: str_field(payload, "item_id").map(ItemId::new),
        listing_ref: str_field(payload, "listing_ref").map(ListingRef::new),
        purchased,
        buyer_ref: str_field(payload, "buyer").map(str::to_string),
        at: raw.at,
        height: raw.height,
    })
}

fn decode_removed(raw: &RawEvent) -> DomainEvent {
    let payload = &raw.payload;
    DomainEvent::Removed(ListingRemoved {
        item_id: str_field(payload, "item_id").map(ItemId::new),
        listing_ref: str_field(payload, "listing_ref").map(ListingRef::new),
        at: raw.at,
        height: raw.height,
    })
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

/// Prices arrive as either a JSON string or a number depending on the
/// upstream encoder version; accept both.
fn price_field(payload: &Value) -> Option<Decimal> {
    match payload.get("price")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(kind: &str, payload: Value) -> RawEvent {
        RawEvent {
            kind: kind.to_string(),
            height: 100,
            at: Utc::now(),
            payload,
        }
    }

    #[test]
    fn decodes_available() {
        let event = decode(&raw(
            "ListingAvailable",
            json!({
                "item_id": "nft-1",
                "listing_ref": "lst-1",
                "group_id": "edition-9",
                "price": "35",
                "seller": "0xseller"
            }),
        ));

        match event {
            DomainEvent::Available(ev) => {
                assert_eq!(ev.item_id.as_str(), "nft-1");
                assert_eq!(ev.listing_ref.as_str(), "lst-1");
                assert_eq!(ev.price, dec!(35));
                assert_eq!(ev.seller_ref.as_deref(), Some("0xseller"));
            }
            other => panic!("expected Available, got {other:?}"),
        }
    }

    #[test]
    fn decodes_numeric_price() {
        let event = decode(&raw(
            "ListingAvailable",
            json!({
                "item_id": "nft-1",
                "listing_ref": "lst-1",
                "group_id": "edition-9",
                "price": 34.99
            }),
        ));

        match event {
            DomainEvent::Available(ev) => assert_eq!(ev.price, dec!(34.99)),
            other => panic!("expected Available, got {other:?}"),
        }
    }

    #[test]
    fn decodes_completed_without_item_or_buyer() {
        let event = decode(&raw(
            "ListingCompleted",
            json!({ "listing_ref": "lst-1", "purchased": true }),
        ));

        match event {
            DomainEvent::Completed(ev) => {
                assert!(ev.item_id.is_none());
                assert!(ev.purchased);
                assert!(ev.buyer_ref.is_none());
                assert_eq!(ev.listing_ref.unwrap().as_str(), "lst-1");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn malformed_payloads_are_unrecognized_not_errors() {
        let cases = [
            raw("ListingAvailable", json!({})),
            raw("ListingAvailable", json!({ "item_id": 7 })),
            raw("ListingAvailable", json!("not an object")),
            raw("ListingCompleted", json!({ "listing_ref": "lst-1" })),
            raw("SomeForeignEvent", json!({ "item_id": "nft-1" })),
        ];
        for case in &cases {
            assert_eq!(decode(case), DomainEvent::Unrecognized, "{}", case.kind);
        }
    }

    #[test]
    fn decodes_removed_with_ref_only() {
        let event = decode(&raw("ListingRemoved", json!({ "listing_ref": "lst-2" })));
        match event {
            DomainEvent::Removed(ev) => {
                assert_eq!(ev.listing_ref.unwrap().as_str(), "lst-2");
                assert!(ev.item_id.is_none());
            }
            other => panic!("expected Removed, got {other:?}"),
        }
    }
}
