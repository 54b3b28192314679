//! Local durable key/value cache.
//!
//! Every store keeps a JSON mirror of its state here so the last known data
//! survives restarts and failed loads. Each store only touches its own keys,
//! so no cross-key transaction is needed.

mod file;
mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub use file::FileCache;
pub use memory::MemoryCache;

/// Cache keys used by the stores.
pub mod keys {
    pub const SHOPPING_LISTS: &str = "tripsheet_shopping_lists";
    pub const SYNC_QUEUE: &str = "shopping_list_sync_queue";
    pub const ITINERARY: &str = "itinerary_items";
    pub const COMPLETED_ITEMS: &str = "completed_items";
    pub const TRAVEL_INFO: &str = "travel_info_items";
    pub const PACKED_ITEMS: &str = "packed_items";
    pub const AUTH_CONFIG: &str = "auth_config";
    pub const AUTH_STATE: &str = "auth_state";
}

/// String-keyed persistence with get/set/remove semantics.
pub trait LocalCache: Send + Sync {
    /// Returns `Ok(None)` if the key has never been set.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Errors that can occur reading or writing the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error for {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Cache entry '{0}' is not valid JSON: {1}")]
    Corrupt(String, #[source] serde_json::Error),

    #[error("Failed to serialize cache entry '{0}': {1}")]
    Serialize(String, #[source] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Reads and decodes a JSON value.
pub fn load_json<T: DeserializeOwned>(
    cache: &dyn LocalCache,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Corrupt(key.to_string(), e)),
        None => Ok(None),
    }
}

/// Encodes and writes a JSON value.
pub fn save_json<T: Serialize + ?Sized>(
    cache: &dyn LocalCache,
    key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialize(key.to_string(), e))?;
    cache.set(key, &raw)
}
