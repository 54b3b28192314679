//! Domain stores.
//!
//! Each store owns the in-memory state for one domain, mirrors it into the
//! local cache, and loads fresh data from its sheet tab. Loads are
//! cache-aside: a successful load replaces state and the mirror, a failed
//! one falls back to the mirror when there is one.

mod auth;
mod itinerary;
mod shopping;
mod state;
mod travel_info;

use std::sync::Arc;

use crate::cache::LocalCache;
use crate::clock::Clock;
use crate::ingest::{CsvSource, ParsingError};
use crate::network::Connectivity;

pub use auth::{AuthError, AuthStore, AUTH_TTL};
pub use itinerary::ItineraryStore;
pub use shopping::{ShoppingError, ShoppingStore, SyncReport};
pub use state::{LoadError, LoadOutcome, LoadState};
pub use travel_info::TravelInfoStore;

/// Capabilities every store is built from.
#[derive(Clone)]
pub struct StoreContext {
    pub cache: Arc<dyn LocalCache>,
    pub clock: Arc<dyn Clock>,
    pub network: Connectivity,
    pub source: Arc<dyn CsvSource>,
}

impl StoreContext {
    pub fn new(
        cache: Arc<dyn LocalCache>,
        clock: Arc<dyn Clock>,
        network: Connectivity,
        source: Arc<dyn CsvSource>,
    ) -> Self {
        Self {
            cache,
            clock,
            network,
            source,
        }
    }
}

/// Fetches one sheet tab and parses it.
pub(crate) async fn fetch_records<T>(
    source: &dyn CsvSource,
    gid: &str,
    parse: impl FnOnce(&str) -> Result<T, ParsingError>,
) -> Result<T, LoadError> {
    let csv = source.fetch(gid).await?;
    Ok(parse(&csv)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;
    use crate::test_support::FixedCsvSource;
    use chrono::{TimeZone, Utc};

    pub struct Fixture {
        pub cache: Arc<MemoryCache>,
        pub clock: Arc<ManualClock>,
        pub network: Connectivity,
        pub source: Arc<FixedCsvSource>,
    }

    impl Fixture {
        /// Online, at 2025-01-15 09:00 UTC.
        pub fn new() -> Self {
            Self {
                cache: Arc::new(MemoryCache::new()),
                clock: Arc::new(ManualClock::new(
                    Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap(),
                )),
                network: Connectivity::new(true),
                source: Arc::new(FixedCsvSource::new()),
            }
        }

        pub fn context(&self) -> StoreContext {
            StoreContext::new(
                self.cache.clone(),
                self.clock.clone(),
                self.network.clone(),
                self.source.clone(),
            )
        }
    }
}
