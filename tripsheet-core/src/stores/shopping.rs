//! Shopping lists with local-first writes.
//!
//! Every mutation lands in memory and in the local cache before anything
//! touches the network. The remote write is best-effort: offline or failed
//! writes go to the [`SyncQueue`], which [`ShoppingStore::sync_pending`]
//! drains once the network is back.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::state::{LoadError, LoadOutcome, LoadState};
use super::{fetch_records, StoreContext};
use crate::cache::{keys, load_json, save_json, CacheError, LocalCache};
use crate::ingest::{self, ParsingError, RecordType};
use crate::models::{ShoppingItem, ShoppingItemPatch, ShoppingList, ShoppingListState};
use crate::sync::{
    batch_update, Debouncer, RemoteWriteError, RemoteWriter, RetryOutcome, SyncOperation,
    SyncQueue, SyncQueueItem, WriteRequest, WriteResponse,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShoppingError {
    #[error("Item name cannot be empty")]
    EmptyName,

    #[error("Shopping item not found: {0}")]
    ItemNotFound(String),
}

/// What a reconnect drain did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Queued writes that went through
    pub sent: usize,
    /// Queued writes that failed and stay queued
    pub failed: usize,
    /// Queued writes dropped at the retry cap
    pub evicted: usize,
    /// Writes still queued afterwards
    pub remaining: usize,
    /// Whether the lists were reloaded from the sheet
    pub reloaded: bool,
}

pub struct ShoppingStore {
    ctx: StoreContext,
    writer: Arc<dyn RemoteWriter>,
    queue: Arc<SyncQueue>,
    debouncer: Debouncer,
    sheet_gid: Option<String>,
    user: String,
    lists: BTreeMap<String, ShoppingList>,
    state: LoadState,
    in_flight: Vec<JoinHandle<()>>,
    /// Newest UPDATE payload per item, queued if its debounced send fails
    latest_updates: Arc<Mutex<HashMap<String, ShoppingItemPatch>>>,
}

impl ShoppingStore {
    /// Builds the store and restores the cached lists and sync queue.
    ///
    /// `user` is recorded as the author of new items and edits.
    pub fn new(
        ctx: StoreContext,
        writer: Arc<dyn RemoteWriter>,
        sheet_gid: Option<String>,
        user: impl Into<String>,
    ) -> Self {
        let queue = Arc::new(SyncQueue::open(ctx.cache.clone(), ctx.clock.clone()));
        let debouncer = Debouncer::new(writer.clone());

        let mut store = Self {
            ctx,
            writer,
            queue,
            debouncer,
            sheet_gid,
            user: user.into(),
            lists: BTreeMap::new(),
            state: LoadState::Unloaded,
            in_flight: Vec::new(),
            latest_updates: Arc::new(Mutex::new(HashMap::new())),
        };
        if let Err(e) = store.load_from_storage() {
            tracing::warn!("Could not restore shopping lists: {}", e);
        }
        store
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// The list for an itinerary entry. Unknown entries get an empty list.
    pub fn get_shopping_list(&self, itinerary_item_id: &str) -> ShoppingList {
        self.lists
            .get(itinerary_item_id)
            .cloned()
            .unwrap_or_else(|| ShoppingList::new(itinerary_item_id))
    }

    pub fn all_shopping_lists(&self) -> impl Iterator<Item = &ShoppingList> {
        self.lists.values()
    }

    pub fn find_item(&self, item_id: &str) -> Option<&ShoppingItem> {
        self.lists.values().find_map(|list| list.find(item_id))
    }

    /// Writes waiting in the sync queue.
    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    /// Writes given up on after hitting the retry cap.
    pub fn dropped_writes(&self) -> usize {
        self.queue.evicted_count()
    }

    /// Replaces the in-memory lists with the cached copy. Returns the
    /// number of items restored.
    pub fn load_from_storage(&mut self) -> Result<usize, CacheError> {
        let stored = self.read_mirror()?.unwrap_or_default();
        Ok(self.install(stored))
    }

    /// Reloads every list from the shopping sheet.
    ///
    /// Pending queued writes are laid back over the fresh data so the view
    /// keeps showing changes the sheet has not seen yet.
    pub async fn load_from_source(&mut self) -> Result<LoadOutcome, LoadError> {
        self.state = LoadState::Loading;

        let result = match self.sheet_gid.as_deref() {
            None => Err(LoadError::NotConfigured(RecordType::ShoppingList)),
            Some(gid) => {
                let clock = self.ctx.clock.clone();
                fetch_records(self.ctx.source.as_ref(), gid, |csv| {
                    match ingest::parse_shopping_list(csv, clock.as_ref()) {
                        Err(ParsingError::Empty) | Err(ParsingError::NoUsableRows(_)) => {
                            Ok(Vec::new())
                        }
                        other => other,
                    }
                })
                .await
            }
        };

        match result {
            Ok(items) => {
                let mut grouped = ShoppingListState::new();
                for item in items {
                    grouped
                        .entry(item.itinerary_item_id.clone())
                        .or_default()
                        .push(item);
                }
                self.install(grouped);
                self.overlay_pending();
                let count = self.item_count();
                self.save_to_storage();
                self.state = LoadState::Ready;
                tracing::info!("Loaded {} shopping items from sheet", count);
                Ok(LoadOutcome::Fresh { count })
            }
            Err(e) => {
                self.state = LoadState::Error(e.to_string());
                match self.read_mirror() {
                    Ok(Some(stored)) => {
                        let count = self.install(stored);
                        tracing::warn!("Shopping load failed, showing cached lists: {}", e);
                        Ok(LoadOutcome::Cached {
                            count,
                            error: e.to_string(),
                        })
                    }
                    Ok(None) => Err(e),
                    Err(cache_err) => {
                        tracing::warn!("Cached shopping lists unreadable: {}", cache_err);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Adds an item built from `draft`, whose `name` is required.
    pub fn add_item(
        &mut self,
        itinerary_item_id: &str,
        draft: ShoppingItemPatch,
    ) -> Result<ShoppingItem, ShoppingError> {
        let name = draft.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(ShoppingError::EmptyName);
        }

        let mut item = ShoppingItem::new(
            Uuid::new_v4().to_string(),
            itinerary_item_id,
            name,
            self.user.clone(),
            self.ctx.clock.now(),
        );
        draft.apply_to(&mut item);

        self.lists
            .entry(itinerary_item_id.to_string())
            .or_insert_with(|| ShoppingList::new(itinerary_item_id))
            .push(item.clone());
        self.save_to_storage();

        self.dispatch(
            SyncOperation::Create,
            &item.id,
            Some(ShoppingItemPatch::from(&item)),
        );
        Ok(item)
    }

    /// Applies `changes` to an item. Identity and creation fields are
    /// ignored.
    pub fn update_item(
        &mut self,
        item_id: &str,
        changes: ShoppingItemPatch,
    ) -> Result<ShoppingItem, ShoppingError> {
        if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ShoppingError::EmptyName);
        }
        self.edit(item_id, |item| changes.apply_to(item))
    }

    pub fn toggle_item_complete(&mut self, item_id: &str) -> Result<ShoppingItem, ShoppingError> {
        self.edit(item_id, |item| item.is_completed = !item.is_completed)
    }

    pub fn delete_item(&mut self, item_id: &str) -> Result<ShoppingItem, ShoppingError> {
        let removed = self
            .remove_local(item_id)
            .ok_or_else(|| ShoppingError::ItemNotFound(item_id.to_string()))?;
        self.save_to_storage();

        if self.debouncer.cancel(item_id) {
            tracing::debug!("Dropped pending update for deleted item {}", item_id);
        }
        lock(&*self.latest_updates).remove(item_id);
        self.dispatch(SyncOperation::Delete, item_id, None);
        Ok(removed)
    }

    /// Forgets one list locally. Nothing is deleted remotely.
    pub fn clear_list(&mut self, itinerary_item_id: &str) {
        self.lists.remove(itinerary_item_id);
        self.save_to_storage();
    }

    /// Forgets every list locally and drops the cached copy.
    pub fn clear_all_lists(&mut self) {
        self.lists.clear();
        if let Err(e) = self.ctx.cache.remove(keys::SHOPPING_LISTS) {
            tracing::warn!("Failed to remove cached shopping lists: {}", e);
        }
    }

    /// Waits for every remote write started so far, including debounced
    /// ones still inside their quiet window.
    pub async fn flush(&mut self) {
        for handle in std::mem::take(&mut self.in_flight) {
            if let Err(e) = handle.await {
                tracing::error!("Remote write task failed: {}", e);
            }
        }
    }

    /// Drains the sync queue after a reconnect.
    ///
    /// The queue is merged, sent in order, and each entry is dequeued on
    /// success or charged a retry on failure. The lists are then reloaded
    /// from the sheet when a shopping tab is configured.
    pub async fn sync_pending(&mut self) -> SyncReport {
        self.flush().await;

        let mut report = SyncReport::default();
        if !self.ctx.network.is_online() {
            tracing::debug!("Still offline, leaving {} writes queued", self.queue.len());
            report.remaining = self.queue.len();
            return report;
        }

        let merged = self.queue.merge();
        if !merged.is_empty() {
            tracing::info!("Draining {} queued writes", merged.len());
            let requests: Vec<WriteRequest> = merged.iter().map(WriteRequest::from).collect();
            let result = batch_update(self.writer.as_ref(), &requests).await;

            for (index, _) in &result.succeeded {
                self.queue.dequeue(&merged[*index].id);
                report.sent += 1;
            }
            for failed in &result.failed {
                let entry = &merged[failed.index];
                match self.queue.record_failure(&entry.id, &failed.error.to_string()) {
                    RetryOutcome::Evicted(_) => report.evicted += 1,
                    RetryOutcome::Retrying { .. } | RetryOutcome::NotFound => report.failed += 1,
                }
            }
        }

        if self.sheet_gid.is_some() {
            match self.load_from_source().await {
                Ok(outcome) => report.reloaded = outcome.is_fresh(),
                Err(e) => tracing::warn!("Reload after sync failed: {}", e),
            }
        }

        report.remaining = self.queue.len();
        report
    }

    fn edit<F>(&mut self, item_id: &str, change: F) -> Result<ShoppingItem, ShoppingError>
    where
        F: FnOnce(&mut ShoppingItem),
    {
        let user = self.user.clone();
        let now = self.ctx.clock.now();
        let edited = self
            .lists
            .values_mut()
            .find(|list| list.find(item_id).is_some())
            .and_then(|list| {
                list.edit(item_id, |item| {
                    change(item);
                    item.touch(Some(user.as_str()), now);
                })
            })
            .ok_or_else(|| ShoppingError::ItemNotFound(item_id.to_string()))?;
        self.save_to_storage();

        self.dispatch(
            SyncOperation::Update,
            item_id,
            Some(ShoppingItemPatch::from(&edited)),
        );
        Ok(edited)
    }

    fn remove_local(&mut self, item_id: &str) -> Option<ShoppingItem> {
        self.lists.values_mut().find_map(|list| list.remove(item_id))
    }

    /// Sends a write, or queues it when offline. Updates go through the
    /// per-item debounce; creates and deletes are sent straight away.
    fn dispatch(
        &mut self,
        operation: SyncOperation,
        item_id: &str,
        data: Option<ShoppingItemPatch>,
    ) {
        if !self.ctx.network.is_online() || tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("Offline, queueing {} for {}", operation, item_id);
            self.queue.enqueue(operation, Some(item_id), data);
            return;
        }

        let request = WriteRequest {
            operation,
            item: data.clone(),
            item_id: Some(item_id.to_string()),
        };
        let send: BoxFuture<'static, Result<WriteResponse, RemoteWriteError>> = match operation {
            SyncOperation::Update => {
                if let Some(patch) = &data {
                    lock(&*self.latest_updates).insert(item_id.to_string(), patch.clone());
                }
                Box::pin(self.debouncer.debounce(item_id, request))
            }
            SyncOperation::Create | SyncOperation::Delete => {
                let writer = self.writer.clone();
                Box::pin(async move { writer.send(&request).await })
            }
        };

        let queue = self.queue.clone();
        let latest_updates = self.latest_updates.clone();
        let item_id = item_id.to_string();
        let handle = tokio::spawn(async move {
            match send.await {
                Ok(_) => {
                    if operation == SyncOperation::Update {
                        let mut latest = lock(&*latest_updates);
                        if latest.get(&item_id) == data.as_ref() {
                            latest.remove(&item_id);
                        }
                    }
                }
                Err(RemoteWriteError::Cancelled) => {
                    tracing::debug!("{} for {} cancelled", operation, item_id);
                }
                Err(e) => {
                    let data = match operation {
                        // The first caller of a failed burst queues the newest
                        // snapshot; the rest find it already taken.
                        SyncOperation::Update => match lock(&*latest_updates).remove(&item_id) {
                            Some(latest) => Some(latest),
                            None => return,
                        },
                        _ => data,
                    };
                    tracing::warn!("{} for {} failed, queued for retry: {}", operation, item_id, e);
                    queue.enqueue(operation, Some(&item_id), data);
                }
            }
        });

        self.in_flight.retain(|handle| !handle.is_finished());
        self.in_flight.push(handle);
    }

    /// Re-applies queued writes over freshly loaded lists.
    fn overlay_pending(&mut self) {
        for entry in self.queue.items() {
            let Some(item_id) = entry.item_id.as_deref() else {
                continue;
            };
            match entry.operation {
                SyncOperation::Delete => {
                    self.remove_local(item_id);
                }
                SyncOperation::Update => {
                    if let Some(patch) = &entry.data {
                        for list in self.lists.values_mut() {
                            list.edit(item_id, |item| patch.apply_to(item));
                        }
                    }
                }
                SyncOperation::Create => {
                    if self.find_item(item_id).is_some() {
                        continue;
                    }
                    if let Some(item) = item_from_queue(&entry) {
                        self.lists
                            .entry(item.itinerary_item_id.clone())
                            .or_insert_with(|| ShoppingList::new(item.itinerary_item_id.clone()))
                            .push(item);
                    }
                }
            }
        }
    }

    fn item_count(&self) -> usize {
        self.lists.values().map(|list| list.items().len()).sum()
    }

    fn read_mirror(&self) -> Result<Option<ShoppingListState>, CacheError> {
        load_json(self.ctx.cache.as_ref(), keys::SHOPPING_LISTS)
    }

    fn install(&mut self, stored: ShoppingListState) -> usize {
        let count = stored.values().map(Vec::len).sum();
        self.lists = stored
            .into_iter()
            .map(|(key, items)| {
                let list = ShoppingList::from_items(key.clone(), items);
                (key, list)
            })
            .collect();
        count
    }

    fn save_to_storage(&self) {
        let state: ShoppingListState = self
            .lists
            .iter()
            .map(|(key, list)| (key.clone(), list.items().to_vec()))
            .collect();
        if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::SHOPPING_LISTS, &state) {
            tracing::warn!("Failed to save shopping lists: {}", e);
        }
    }
}

/// Rebuilds a not-yet-synced item from its queued CREATE payload.
fn item_from_queue(entry: &SyncQueueItem) -> Option<ShoppingItem> {
    let data = entry.data.as_ref()?;
    let created_at = data.created_at.unwrap_or(entry.timestamp);
    let mut item = ShoppingItem::new(
        data.id.clone()?,
        data.itinerary_item_id.clone()?,
        data.name.clone()?,
        data.created_by.clone().unwrap_or_default(),
        created_at,
    );
    data.apply_to(&mut item);
    item.last_updated_by = data.last_updated_by.clone();
    item.last_updated_at = data.last_updated_at.unwrap_or(created_at).max(created_at);
    Some(item)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::models::DEFAULT_CURRENCY;
    use crate::stores::fixtures::Fixture;
    use crate::sync::MAX_RETRIES;
    use crate::test_support::ScriptedWriter;
    use chrono::Duration;

    const GID: &str = "77";

    fn store(fx: &Fixture, writer: &Arc<ScriptedWriter>) -> ShoppingStore {
        ShoppingStore::new(fx.context(), writer.clone(), Some(GID.to_string()), "mom")
    }

    fn draft(name: &str) -> ShoppingItemPatch {
        ShoppingItemPatch {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_item_offline() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        let item = store
            .add_item(
                "trip-1",
                ShoppingItemPatch {
                    name: Some("  Tokyo Banana ".to_string()),
                    quantity: Some(2),
                    estimated_amount: Some(1200.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(item.name, "Tokyo Banana");
        assert_eq!(item.currency, DEFAULT_CURRENCY);
        assert_eq!(item.created_by, "mom");

        let list = store.get_shopping_list("trip-1");
        assert_eq!(list.items().len(), 1);
        assert_eq!(list.total_estimated_amount(), 1200.0);

        let queued = store.queue().items();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].operation, SyncOperation::Create);
        assert_eq!(queued[0].item_id.as_deref(), Some(item.id.as_str()));
        assert_eq!(queued[0].id, format!("CREATE-{}", item.id));
        assert!(writer.sent().is_empty());

        let reopened = ShoppingStore::new(fx.context(), writer.clone(), None, "dad");
        assert_eq!(reopened.find_item(&item.id), Some(&item));
        assert_eq!(reopened.pending_writes(), 1);
    }

    #[test]
    fn test_rejects_blank_names_and_unknown_items() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        assert_eq!(
            store.add_item("trip-1", draft("   ")).unwrap_err(),
            ShoppingError::EmptyName
        );
        assert_eq!(
            store.toggle_item_complete("nope").unwrap_err(),
            ShoppingError::ItemNotFound("nope".to_string())
        );
        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        assert_eq!(
            store.update_item(&item.id, draft("")).unwrap_err(),
            ShoppingError::EmptyName
        );
        assert!(store.get_shopping_list("unknown").items().is_empty());
    }

    #[test]
    fn test_toggle_recomputes_and_stamps() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.add_item("trip-1", draft("Kit Kat")).unwrap();
        fx.clock.advance(Duration::minutes(5));

        let toggled = store.toggle_item_complete(&item.id).unwrap();
        assert!(toggled.is_completed);
        assert_eq!(toggled.last_updated_at, fx.clock.now());
        assert!(toggled.last_updated_at >= toggled.created_at);
        assert_eq!(store.get_shopping_list("trip-1").completed_count(), 1);

        let queued = store.queue().items();
        let update = queued.iter().find(|q| q.operation == SyncOperation::Update).unwrap();
        assert_eq!(update.data.as_ref().unwrap().is_completed, Some(true));
        assert_eq!(update.data.as_ref().unwrap().name.as_deref(), Some("Pocky"));
    }

    #[tokio::test]
    async fn test_online_create_and_delete_are_sent_directly() {
        let fx = Fixture::new();
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.delete_item(&item.id).unwrap();
        store.flush().await;

        let sent = writer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].operation, SyncOperation::Create);
        assert_eq!(sent[0].item.as_ref().unwrap().name.as_deref(), Some("Pocky"));
        assert_eq!(sent[1], WriteRequest::delete(item.id.clone()));
        assert_eq!(store.pending_writes(), 0);
        assert!(store.get_shopping_list("trip-1").items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_waiting_update() {
        let fx = Fixture::new();
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.flush().await;
        store.update_item(&item.id, draft("Pocky (matcha)")).unwrap();
        store.delete_item(&item.id).unwrap();
        store.flush().await;
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;

        let operations: Vec<SyncOperation> =
            writer.sent().iter().map(|request| request.operation).collect();
        assert_eq!(operations, vec![SyncOperation::Create, SyncOperation::Delete]);
        assert_eq!(store.pending_writes(), 0);
        assert!(lock(&*store.latest_updates).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sent_updates_are_forgotten() {
        let fx = Fixture::new();
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.update_item(&item.id, draft("A")).unwrap();
        store.update_item(&item.id, draft("B")).unwrap();
        store.flush().await;

        assert_eq!(writer.sent().len(), 2);
        assert!(lock(&*store.latest_updates).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_updates_send_once_with_latest_payload() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);
        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.queue().clear();
        fx.network.set_online(true);

        store.update_item(&item.id, draft("Pocky (matcha)")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store
            .update_item(
                &item.id,
                ShoppingItemPatch {
                    quantity: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        store.flush().await;

        let sent = writer.sent();
        assert_eq!(sent.len(), 1);
        let payload = sent[0].item.as_ref().unwrap();
        assert_eq!(payload.name.as_deref(), Some("Pocky (matcha)"));
        assert_eq!(payload.quantity, Some(3));
        assert_eq!(store.pending_writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_remote_write_is_queued() {
        let fx = Fixture::new();
        let writer = Arc::new(ScriptedWriter::new());
        writer.fail_everything(RemoteWriteError::Transport("timeout".to_string()));
        let mut store = store(&fx, &writer);

        let item = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.update_item(&item.id, draft("A")).unwrap();
        store.update_item(&item.id, draft("B")).unwrap();
        store.flush().await;

        let queued = store.queue().items();
        let ids: Vec<&str> = queued.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![format!("CREATE-{}", item.id), format!("UPDATE-{}", item.id)]
        );
        assert_eq!(queued[1].data.as_ref().unwrap().name.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_sync_pending_drains_merged_queue_and_reloads() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        let kept = store.add_item("trip-1", draft("Pocky")).unwrap();
        store.toggle_item_complete(&kept.id).unwrap();
        let dropped = store.add_item("trip-1", draft("Gum")).unwrap();
        store.delete_item(&dropped.id).unwrap();
        assert_eq!(store.pending_writes(), 4);

        fx.source.set(
            GID,
            &format!(
                "id,itineraryItemId,itemName,isCompleted\n{},trip-1,Pocky,true\n",
                kept.id
            ),
        );
        fx.network.set_online(true);
        let report = store.sync_pending().await;

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.remaining, 0);
        assert!(report.reloaded);

        let sent = writer.sent();
        assert_eq!(sent[0].operation, SyncOperation::Create);
        assert_eq!(sent[0].item.as_ref().unwrap().is_completed, Some(true));
        assert_eq!(sent[1], WriteRequest::delete(dropped.id.clone()));

        let list = store.get_shopping_list("trip-1");
        assert_eq!(list.items().len(), 1);
        assert!(list.items()[0].is_completed);
        assert!(store.state().is_ready());
    }

    #[tokio::test]
    async fn test_sync_pending_evicts_after_retry_cap() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        writer.fail_everything(RemoteWriteError::Status {
            status: 500,
            body: String::new(),
        });
        let mut store = ShoppingStore::new(fx.context(), writer.clone(), None, "mom");
        store.add_item("trip-1", draft("Pocky")).unwrap();
        fx.network.set_online(true);

        for attempt in 1..MAX_RETRIES {
            let report = store.sync_pending().await;
            assert_eq!(report.failed, 1, "attempt {}", attempt);
            assert_eq!(report.remaining, 1);
        }
        let report = store.sync_pending().await;
        assert_eq!(report.evicted, 1);
        assert_eq!(report.remaining, 0);
        assert_eq!(store.dropped_writes(), 1);
        assert!(!report.reloaded);
        assert_eq!(store.get_shopping_list("trip-1").items().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_pending_while_offline_does_nothing() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);
        store.add_item("trip-1", draft("Pocky")).unwrap();

        let report = store.sync_pending().await;
        assert_eq!(report.remaining, 1);
        assert!(writer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reload_keeps_pending_changes_visible() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        fx.source.set(
            GID,
            "id,itineraryItemId,itemName\ns-1,trip-1,Pocky\ns-2,trip-1,Gum\n",
        );
        store.load_from_source().await.unwrap();
        store.delete_item("s-2").unwrap();
        store.update_item("s-1", draft("Pocky (matcha)")).unwrap();
        let added = store.add_item("trip-2", draft("Onigiri")).unwrap();

        let outcome = store.load_from_source().await.unwrap();
        assert!(outcome.is_fresh());
        assert_eq!(outcome.count(), 2);
        let trip1 = store.get_shopping_list("trip-1");
        assert_eq!(trip1.items().len(), 1);
        assert_eq!(trip1.items()[0].name, "Pocky (matcha)");
        assert!(store.find_item(&added.id).is_some());
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_cache() {
        let fx = Fixture::new();
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        fx.source.fail(GID, crate::ingest::SheetError::Status(503));
        let err = store.load_from_source().await.unwrap_err();
        assert!(matches!(err, LoadError::Sheet(_)));
        assert!(store.state().error().is_some());

        fx.source
            .set(GID, "id,itineraryItemId,itemName\ns-1,trip-1,Pocky\n");
        store.load_from_source().await.unwrap();
        fx.source
            .fail(GID, crate::ingest::SheetError::Network("down".to_string()));

        let outcome = store.load_from_source().await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Cached {
                count: 1,
                error: "Network error fetching sheet: down".to_string()
            }
        );
        assert!(store.state().error().is_some());
        assert!(store.find_item("s-1").is_some());
    }

    #[tokio::test]
    async fn test_empty_sheet_clears_lists() {
        let fx = Fixture::new();
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);

        fx.source.set(GID, "id,itineraryItemId,itemName\n");
        let outcome = store.load_from_source().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Fresh { count: 0 });
    }

    #[test]
    fn test_clear_lists() {
        let fx = Fixture::new();
        fx.network.set_online(false);
        let writer = Arc::new(ScriptedWriter::new());
        let mut store = store(&fx, &writer);
        store.add_item("trip-1", draft("a")).unwrap();
        store.add_item("trip-2", draft("b")).unwrap();

        store.clear_list("trip-1");
        assert_eq!(store.all_shopping_lists().count(), 1);

        store.clear_all_lists();
        assert_eq!(store.all_shopping_lists().count(), 0);
        assert!(fx.cache.get(keys::SHOPPING_LISTS).unwrap().is_none());
    }
}
