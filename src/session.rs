//! Wiring the core stores to this process's storage, clock and network.

use std::sync::Arc;

use async_trait::async_trait;
use tripsheet_core::stores::StoreContext;
use tripsheet_core::sync::{RemoteWriteError, RemoteWriter, WriteRequest, WriteResponse};
use tripsheet_core::{
    AuthStore, Connectivity, FileCache, HttpCsvSource, HttpRemoteWriter, ItineraryStore,
    ShoppingStore, SystemClock, TravelInfoStore,
};

use crate::config::Config;

/// Stands in for the write endpoint when none is configured. Every write
/// fails, so it lands in the sync queue.
struct UnconfiguredWriter;

#[async_trait]
impl RemoteWriter for UnconfiguredWriter {
    async fn send(&self, _request: &WriteRequest) -> Result<WriteResponse, RemoteWriteError> {
        Err(RemoteWriteError::Transport(
            "write_url is not configured".to_string(),
        ))
    }
}

pub struct Session {
    ctx: StoreContext,
    writer: Arc<dyn RemoteWriter>,
    config: Config,
}

impl Session {
    /// Builds the shared capabilities. Without a sheet id the session still
    /// works from the local cache; every sheet load then fails.
    pub fn open(config: &Config, offline: bool) -> Self {
        let cache = Arc::new(FileCache::new(config.data_dir.value.clone()));
        let sheet_id = config.sheet_id.value.clone().unwrap_or_default();
        let source = Arc::new(HttpCsvSource::with_base_url(
            config.export_base_url.value.clone(),
            sheet_id,
        ));

        let writer: Arc<dyn RemoteWriter> = match &config.write_url.value {
            Some(url) => Arc::new(HttpRemoteWriter::new(url.clone())),
            None => Arc::new(UnconfiguredWriter),
        };
        let online = !offline && config.write_url.value.is_some();
        if !online {
            tracing::debug!("Running offline, writes will be queued");
        }

        let ctx = StoreContext::new(
            cache,
            Arc::new(SystemClock),
            Connectivity::new(online),
            source,
        );

        Self {
            ctx,
            writer,
            config: config.clone(),
        }
    }

    pub fn network(&self) -> &Connectivity {
        &self.ctx.network
    }

    pub fn itinerary(&self) -> ItineraryStore {
        ItineraryStore::new(self.ctx.clone(), self.config.tabs.itinerary.clone())
    }

    pub fn travel_info(&self) -> TravelInfoStore {
        TravelInfoStore::new(self.ctx.clone(), self.config.tabs.travel_info.clone())
    }

    pub fn auth(&self) -> AuthStore {
        AuthStore::new(self.ctx.clone(), self.config.tabs.auth.clone())
    }

    pub fn shopping(&self) -> ShoppingStore {
        ShoppingStore::new(
            self.ctx.clone(),
            self.writer.clone(),
            self.config.tabs.shopping.clone(),
            self.config.user.value.clone(),
        )
    }
}
