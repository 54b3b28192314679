//! Tripsheet Core Library
//!
//! Offline-capable itinerary and shopping-list data, loaded from spreadsheet
//! CSV exports and written back through a remote endpoint.

pub mod cache;
pub mod clock;
pub mod dates;
pub mod ingest;
pub mod models;
pub mod network;
pub mod search;
pub mod stores;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use cache::{CacheError, FileCache, LocalCache, MemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ingest::{parse, CsvSource, HttpCsvSource, ParsingError, RecordType, Records, SheetError};
pub use models::{
    AuthConfig, AuthItem, AuthState, InfoItem, ItineraryDay, ItineraryItem, ShoppingItem,
    ShoppingItemPatch, ShoppingList,
};
pub use network::Connectivity;
pub use stores::{
    AuthError, AuthStore, ItineraryStore, LoadError, LoadOutcome, LoadState, ShoppingError,
    ShoppingStore, StoreContext, SyncReport, TravelInfoStore,
};
pub use sync::{
    HttpRemoteWriter, RemoteWriteError, RemoteWriter, SyncOperation, SyncQueue, SyncQueueItem,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
