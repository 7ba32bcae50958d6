//! Newtype identifiers for the marketplace domain.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying ID string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id! {
    /// Stable identifier of a traded asset. Unique key of a listing.
    ItemId
}

string_id! {
    /// Marketplace-assigned identifier for one listing instance.
    ///
    /// The strongest correlation key between "available" and
    /// "completed/removed" events; an item that is sold and relisted gets
    /// a fresh ref each cycle.
    ListingRef
}

string_id! {
    /// Fungible grouping an item belongs to (edition). Floor prices are
    /// tracked per group.
    GroupId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips() {
        let id = ItemId::new("nft-42");
        assert_eq!(id.as_str(), "nft-42");
        assert_eq!(id.to_string(), "nft-42");
    }

    #[test]
    fn ids_are_distinct_types() {
        let item = ItemId::from("x");
        let group = GroupId::from("x");
        assert_eq!(item.as_str(), group.as_str());
    }
}
