//! Persistence adapters for the listing and checkpoint stores.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryCheckpointStore, MemoryListingStore};
pub use sqlite::{SqliteCheckpointStore, SqliteListingStore};
