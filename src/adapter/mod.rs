//! Concrete implementations of the ports in [`crate::port`].

pub mod ledger;
pub mod price;
pub mod store;

pub use ledger::LedgerClient;
pub use price::PriceClient;
