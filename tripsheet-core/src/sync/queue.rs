//! Durable queue of shopping writes that could not reach the remote endpoint.
//!
//! The whole queue is the unit of persistence: every mutation rewrites the
//! full list under [`keys::SYNC_QUEUE`]. The in-memory copy stays
//! authoritative when the cache cannot be written, so a storage failure
//! degrades to "not durable" rather than "lost".

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{keys, load_json, save_json, CacheError, LocalCache};
use crate::clock::Clock;
use crate::models::ShoppingItemPatch;

/// Failed attempts after which a queued write is given up on.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Create => write!(f, "CREATE"),
            SyncOperation::Update => write!(f, "UPDATE"),
            SyncOperation::Delete => write!(f, "DELETE"),
        }
    }
}

/// One pending write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    /// `<OPERATION>-<itemId>`; doubles as the dedupe key
    pub id: String,
    pub operation: SyncOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ShoppingItemPatch>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    /// Key used when collapsing the queue.
    fn merge_key(&self) -> &str {
        self.item_id.as_deref().unwrap_or(&self.id)
    }
}

/// The durable copy of the queue could not be read or written.
#[derive(Error, Debug)]
#[error("Sync queue persistence failed: {0}")]
pub struct QueuePersistenceError(#[from] CacheError);

/// What [`SyncQueue::record_failure`] did with the entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// Still queued; this many attempts have failed
    Retrying { retry_count: u32 },
    /// Hit the retry cap and was dropped
    Evicted(SyncQueueItem),
    /// No entry with that id
    NotFound,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<SyncQueueItem>,
    evicted: usize,
}

/// Ordered, deduplicating queue of pending writes with retry accounting.
pub struct SyncQueue {
    cache: Arc<dyn LocalCache>,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl SyncQueue {
    /// Opens the queue, restoring whatever was persisted.
    ///
    /// An unreadable queue starts empty.
    pub fn open(cache: Arc<dyn LocalCache>, clock: Arc<dyn Clock>) -> Self {
        let items = match load_json::<Vec<SyncQueueItem>>(cache.as_ref(), keys::SYNC_QUEUE) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                tracing::error!("{}, starting with an empty queue", QueuePersistenceError(e));
                Vec::new()
            }
        };
        if !items.is_empty() {
            tracing::debug!("Restored {} queued writes", items.len());
        }

        Self {
            cache,
            clock,
            state: Mutex::new(QueueState {
                items,
                evicted: 0,
            }),
        }
    }

    /// Queues a write and returns its entry id.
    ///
    /// An existing entry for the same operation and item is replaced in
    /// place, with its retry state reset. Otherwise the entry is appended.
    pub fn enqueue(
        &self,
        operation: SyncOperation,
        item_id: Option<&str>,
        data: Option<ShoppingItemPatch>,
    ) -> String {
        let now = self.clock.now();
        let id = match item_id {
            Some(item_id) => format!("{}-{}", operation, item_id),
            None => format!("{}-{}", operation, now.timestamp_millis()),
        };

        let mut state = self.lock();
        match state.items.iter_mut().find(|item| item.id == id) {
            Some(existing) => {
                if data.is_some() {
                    existing.data = data;
                }
                existing.timestamp = now;
                existing.retry_count = 0;
                existing.last_error = None;
                tracing::debug!("Replaced queued write {}", id);
            }
            None => {
                state.items.push(SyncQueueItem {
                    id: id.clone(),
                    operation,
                    item_id: item_id.map(str::to_string),
                    data,
                    timestamp: now,
                    retry_count: 0,
                    last_error: None,
                });
                tracing::debug!("Queued write {} ({} pending)", id, state.items.len());
            }
        }
        self.persist(&state.items);

        id
    }

    /// Removes an entry. Removing an absent id does nothing.
    pub fn dequeue(&self, id: &str) {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        if state.items.len() != before {
            tracing::debug!("Dequeued write {}", id);
            self.persist(&state.items);
        }
    }

    /// Counts a failed attempt, evicting the entry once it reaches
    /// [`MAX_RETRIES`].
    pub fn record_failure(&self, id: &str, error: &str) -> RetryOutcome {
        let mut state = self.lock();
        let Some(index) = state.items.iter().position(|item| item.id == id) else {
            return RetryOutcome::NotFound;
        };

        let entry = &mut state.items[index];
        entry.retry_count += 1;
        entry.last_error = Some(error.to_string());
        let retry_count = entry.retry_count;

        let outcome = if retry_count >= MAX_RETRIES {
            let evicted = state.items.remove(index);
            state.evicted += 1;
            tracing::error!(
                "Giving up on {} after {} failed attempts: {}",
                evicted.id,
                retry_count,
                error
            );
            RetryOutcome::Evicted(evicted)
        } else {
            tracing::warn!(
                "Write {} failed (attempt {}/{}): {}",
                id,
                retry_count,
                MAX_RETRIES,
                error
            );
            RetryOutcome::Retrying { retry_count }
        };

        self.persist(&state.items);
        outcome
    }

    /// Collapses the queue to one entry per item and returns it for draining.
    ///
    /// Entries are folded in queue order:
    /// - a DELETE replaces whatever was resolved for the item, and anything
    ///   queued after it for the same item is dropped
    /// - an UPDATE after a CREATE folds its payload into the CREATE
    /// - anything else replaces the resolved entry
    ///
    /// The merged queue is persisted in place of the old one.
    pub fn merge(&self) -> Vec<SyncQueueItem> {
        let mut state = self.lock();
        let before = state.items.len();

        let mut order: Vec<String> = Vec::new();
        let mut resolved: HashMap<String, SyncQueueItem> = HashMap::new();

        for item in state.items.drain(..) {
            let key = item.merge_key().to_string();
            let Some(current) = resolved.get_mut(&key) else {
                order.push(key.clone());
                resolved.insert(key, item);
                continue;
            };

            match (current.operation, item.operation) {
                (_, SyncOperation::Delete) => *current = item,
                (SyncOperation::Delete, _) => {
                    tracing::debug!("Dropping {} queued after delete of {}", item.id, key);
                }
                (SyncOperation::Create, SyncOperation::Update) => {
                    current.data = match (current.data.take(), item.data) {
                        (Some(created), Some(updated)) => Some(created.merge(updated)),
                        (created, updated) => updated.or(created),
                    };
                    current.timestamp = item.timestamp;
                }
                _ => *current = item,
            }
        }

        state.items = order
            .iter()
            .filter_map(|key| resolved.remove(key))
            .collect();

        if state.items.len() != before {
            tracing::debug!("Merged {} queued writes into {}", before, state.items.len());
        }
        self.persist(&state.items);

        state.items.clone()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.items.clear();
        if let Err(e) = self.cache.remove(keys::SYNC_QUEUE) {
            tracing::error!("{}", QueuePersistenceError(e));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Snapshot of the pending entries in drain order.
    pub fn items(&self) -> Vec<SyncQueueItem> {
        self.lock().items.clone()
    }

    /// Entries dropped at the retry cap since the queue was opened.
    pub fn evicted_count(&self) -> usize {
        self.lock().evicted
    }

    fn persist(&self, items: &[SyncQueueItem]) {
        if let Err(e) = save_json(self.cache.as_ref(), keys::SYNC_QUEUE, items) {
            tracing::error!("{}", QueuePersistenceError(e));
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn setup() -> (Arc<MemoryCache>, Arc<ManualClock>, SyncQueue) {
        let cache = Arc::new(MemoryCache::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap(),
        ));
        let queue = SyncQueue::open(cache.clone(), clock.clone());
        (cache, clock, queue)
    }

    fn patch_name(name: &str) -> Option<ShoppingItemPatch> {
        Some(ShoppingItemPatch {
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_entry_ids() {
        let (_, clock, queue) = setup();

        assert_eq!(queue.enqueue(SyncOperation::Create, Some("A"), None), "CREATE-A");
        assert_eq!(
            queue.enqueue(SyncOperation::Delete, None, None),
            format!("DELETE-{}", clock.now().timestamp_millis())
        );
    }

    #[test]
    fn test_enqueue_same_pair_replaces_in_place() {
        let (_, clock, queue) = setup();

        let id = queue.enqueue(SyncOperation::Update, Some("A"), patch_name("first"));
        queue.enqueue(SyncOperation::Create, Some("B"), None);
        queue.record_failure(&id, "timeout");
        clock.advance(Duration::seconds(5));
        queue.enqueue(SyncOperation::Update, Some("A"), patch_name("second"));

        let items = queue.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "UPDATE-A");
        assert_eq!(items[0].data, patch_name("second"));
        assert_eq!(items[0].retry_count, 0);
        assert_eq!(items[0].last_error, None);
        assert_eq!(items[0].timestamp, clock.now());
        assert_eq!(items[1].id, "CREATE-B");
    }

    #[test]
    fn test_dequeue_is_idempotent() {
        let (_, _, queue) = setup();

        let id = queue.enqueue(SyncOperation::Create, Some("A"), None);
        queue.dequeue(&id);
        queue.dequeue(&id);
        queue.dequeue("never-queued");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_eviction_at_retry_cap() {
        let (_, _, queue) = setup();
        let id = queue.enqueue(SyncOperation::Update, Some("A"), patch_name("x"));

        assert_eq!(
            queue.record_failure(&id, "HTTP 500"),
            RetryOutcome::Retrying { retry_count: 1 }
        );
        assert_eq!(
            queue.record_failure(&id, "HTTP 500"),
            RetryOutcome::Retrying { retry_count: 2 }
        );
        assert_eq!(queue.items()[0].last_error.as_deref(), Some("HTTP 500"));

        match queue.record_failure(&id, "HTTP 502") {
            RetryOutcome::Evicted(item) => {
                assert_eq!(item.id, id);
                assert_eq!(item.retry_count, 3);
                assert_eq!(item.last_error.as_deref(), Some("HTTP 502"));
            }
            other => panic!("expected eviction, got {:?}", other),
        }
        assert!(queue.is_empty());
        assert_eq!(queue.evicted_count(), 1);
        assert_eq!(queue.record_failure(&id, "again"), RetryOutcome::NotFound);
    }

    #[test]
    fn test_merge_create_then_update() {
        let (_, clock, queue) = setup();

        let create = ShoppingItemPatch {
            id: Some("A".to_string()),
            name: Some("Pocky".to_string()),
            quantity: Some(1),
            ..Default::default()
        };
        let update = ShoppingItemPatch {
            name: Some("Pocky (matcha)".to_string()),
            is_completed: Some(true),
            ..Default::default()
        };
        queue.enqueue(SyncOperation::Create, Some("A"), Some(create));
        clock.advance(Duration::seconds(1));
        queue.enqueue(SyncOperation::Update, Some("A"), Some(update));

        let merged = queue.merge();
        assert_eq!(merged.len(), 1);
        let entry = &merged[0];
        assert_eq!(entry.id, "CREATE-A");
        assert_eq!(entry.operation, SyncOperation::Create);
        assert_eq!(entry.timestamp, clock.now());

        let data = entry.data.as_ref().unwrap();
        assert_eq!(data.id.as_deref(), Some("A"));
        assert_eq!(data.name.as_deref(), Some("Pocky (matcha)"));
        assert_eq!(data.quantity, Some(1));
        assert_eq!(data.is_completed, Some(true));
    }

    #[test]
    fn test_merge_create_then_delete() {
        let (_, _, queue) = setup();

        queue.enqueue(SyncOperation::Create, Some("A"), patch_name("x"));
        queue.enqueue(SyncOperation::Delete, Some("A"), None);

        let merged = queue.merge();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "DELETE-A");
        assert_eq!(merged[0].operation, SyncOperation::Delete);
    }

    #[test]
    fn test_merge_delete_discards_later_writes() {
        let (_, _, queue) = setup();

        queue.enqueue(SyncOperation::Delete, Some("A"), None);
        queue.enqueue(SyncOperation::Update, Some("A"), patch_name("late"));
        queue.enqueue(SyncOperation::Create, Some("A"), patch_name("again"));

        let merged = queue.merge();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].operation, SyncOperation::Delete);
    }

    #[test]
    fn test_merge_keeps_first_appearance_order() {
        let (_, _, queue) = setup();

        queue.enqueue(SyncOperation::Update, Some("B"), patch_name("b"));
        queue.enqueue(SyncOperation::Create, Some("A"), patch_name("a"));
        queue.enqueue(SyncOperation::Create, Some("C"), None);
        queue.enqueue(SyncOperation::Delete, Some("C"), None);
        queue.enqueue(SyncOperation::Update, Some("D"), patch_name("d"));
        queue.enqueue(SyncOperation::Delete, Some("D"), None);

        let merged = queue.merge();
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["UPDATE-B", "CREATE-A", "DELETE-C", "DELETE-D"]);
        assert_eq!(queue.items(), merged);
    }

    #[test]
    fn test_merge_is_persisted() {
        let (cache, clock, queue) = setup();

        queue.enqueue(SyncOperation::Create, Some("A"), patch_name("x"));
        queue.enqueue(SyncOperation::Update, Some("A"), patch_name("y"));
        queue.merge();

        let reopened = SyncQueue::open(cache, clock);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.items()[0].id, "CREATE-A");
    }

    #[test]
    fn test_survives_reopen_with_camel_case_layout() {
        let (cache, clock, queue) = setup();
        queue.enqueue(SyncOperation::Update, Some("A"), patch_name("x"));

        let raw = cache.get(keys::SYNC_QUEUE).unwrap().unwrap();
        assert!(raw.contains("\"operation\":\"UPDATE\""));
        assert!(raw.contains("\"itemId\":\"A\""));
        assert!(raw.contains("\"retryCount\":0"));

        let reopened = SyncQueue::open(cache, clock);
        assert_eq!(reopened.items(), queue.items());
    }

    #[test]
    fn test_storage_failure_keeps_memory_queue() {
        let (cache, _, queue) = setup();
        cache.set_writable(false);

        queue.enqueue(SyncOperation::Create, Some("A"), None);
        assert_eq!(queue.len(), 1);
        assert!(cache.get(keys::SYNC_QUEUE).unwrap().is_none());

        cache.set_writable(true);
        queue.enqueue(SyncOperation::Create, Some("B"), None);
        let raw = cache.get(keys::SYNC_QUEUE).unwrap().unwrap();
        assert!(raw.contains("CREATE-A"));
    }

    #[test]
    fn test_corrupt_queue_starts_empty() {
        let cache = Arc::new(MemoryCache::new());
        cache.set(keys::SYNC_QUEUE, "not json").unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let queue = SyncQueue::open(cache, clock);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear() {
        let (cache, _, queue) = setup();
        queue.enqueue(SyncOperation::Create, Some("A"), None);
        queue.clear();
        assert!(queue.is_empty());
        assert!(cache.get(keys::SYNC_QUEUE).unwrap().is_none());
    }
}
