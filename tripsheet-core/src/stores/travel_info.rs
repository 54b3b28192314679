//! Reference info for the trip and the packing checklist.

use std::collections::{BTreeMap, BTreeSet};

use super::state::{LoadError, LoadOutcome, LoadState};
use super::{fetch_records, StoreContext};
use crate::cache::{keys, load_json, save_json};
use crate::ingest::{self, ParsingError};
use crate::models::{InfoItem, DEFAULT_INFO_CATEGORY, PACKING_CATEGORY};

pub struct TravelInfoStore {
    ctx: StoreContext,
    sheet_gid: String,
    items: Vec<InfoItem>,
    selected_category: Option<String>,
    packed: BTreeSet<String>,
    state: LoadState,
}

impl TravelInfoStore {
    pub fn new(ctx: StoreContext, sheet_gid: impl Into<String>) -> Self {
        let mut store = Self {
            ctx,
            sheet_gid: sheet_gid.into(),
            items: Vec::new(),
            selected_category: None,
            packed: BTreeSet::new(),
            state: LoadState::Unloaded,
        };
        if let Some(items) = store.read_mirror() {
            store.items = items;
        }
        store.restore_packing_state();
        store
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn items(&self) -> &[InfoItem] {
        &self.items
    }

    /// Loads the travel-info tab. A sheet with no usable rows is shown as
    /// an empty list rather than treated as a failure.
    pub async fn load_from_source(&mut self) -> Result<LoadOutcome, LoadError> {
        self.state = LoadState::Loading;

        let result = fetch_records(self.ctx.source.as_ref(), &self.sheet_gid, |csv| {
            match ingest::parse_travel_info(csv) {
                Err(ParsingError::Empty) | Err(ParsingError::NoUsableRows(_)) => {
                    tracing::warn!("Travel info sheet is empty, showing an empty list");
                    Ok(Vec::new())
                }
                other => other,
            }
        })
        .await;

        match result {
            Ok(mut items) => {
                for item in &mut items {
                    item.refresh_derived();
                }
                let count = items.len();
                if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::TRAVEL_INFO, &items) {
                    tracing::warn!("Failed to cache travel info: {}", e);
                }
                self.items = items;
                self.restore_packing_state();
                self.state = LoadState::Ready;
                tracing::info!("Loaded {} travel info items", count);
                Ok(LoadOutcome::Fresh { count })
            }
            Err(e) => {
                self.state = LoadState::Error(e.to_string());
                match self.read_mirror() {
                    Some(items) => {
                        self.items = items;
                        self.restore_packing_state();
                        tracing::warn!("Travel info load failed, showing cached copy: {}", e);
                        Ok(LoadOutcome::Cached {
                            count: self.items.len(),
                            error: e.to_string(),
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let unique: BTreeSet<&str> = self
            .items
            .iter()
            .map(|item| item.category.as_str())
            .filter(|category| !category.is_empty())
            .collect();
        unique.into_iter().map(str::to_string).collect()
    }

    /// Narrows [`filtered_items`](Self::filtered_items) to one category, or
    /// clears the filter with `None`.
    pub fn filter_by_category(&mut self, category: Option<&str>) {
        self.selected_category = category.map(str::to_string);
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selected_category.as_deref()
    }

    pub fn filtered_items(&self) -> Vec<&InfoItem> {
        self.items
            .iter()
            .filter(|item| match &self.selected_category {
                Some(category) => &item.category == category,
                None => true,
            })
            .collect()
    }

    pub fn items_by_category(&self) -> BTreeMap<String, Vec<&InfoItem>> {
        let mut grouped: BTreeMap<String, Vec<&InfoItem>> = BTreeMap::new();
        for item in &self.items {
            let category = if item.category.is_empty() {
                DEFAULT_INFO_CATEGORY
            } else {
                item.category.as_str()
            };
            grouped.entry(category.to_string()).or_default().push(item);
        }
        grouped
    }

    pub fn packing_list(&self) -> Vec<&InfoItem> {
        self.items
            .iter()
            .filter(|item| item.category == PACKING_CATEGORY)
            .collect()
    }

    /// Packed share of the packing list, as a rounded percent.
    pub fn packing_progress(&self) -> u32 {
        let list = self.packing_list();
        if list.is_empty() {
            return 0;
        }
        let packed = list.iter().filter(|item| item.is_packed).count();
        ((packed as f64 / list.len() as f64) * 100.0).round() as u32
    }

    /// Flips an item's packed flag. Returns the new flag, or `None` for an
    /// unknown id.
    pub fn toggle_packed(&mut self, item_id: &str) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == item_id)?;
        item.is_packed = !item.is_packed;
        if item.is_packed {
            self.packed.insert(item_id.to_string());
        } else {
            self.packed.remove(item_id);
        }
        let packed = item.is_packed;
        self.save_packing_state();
        Some(packed)
    }

    pub fn clear_packing_state(&mut self) {
        self.packed.clear();
        for item in &mut self.items {
            item.is_packed = false;
        }
        if let Err(e) = self.ctx.cache.remove(keys::PACKED_ITEMS) {
            tracing::warn!("Failed to clear packing state: {}", e);
        }
    }

    /// Reloads the packed id set and applies it to the items.
    pub fn restore_packing_state(&mut self) {
        match load_json::<BTreeSet<String>>(self.ctx.cache.as_ref(), keys::PACKED_ITEMS) {
            Ok(Some(ids)) => self.packed = ids,
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not restore packing state: {}", e),
        }
        for item in &mut self.items {
            item.is_packed = self.packed.contains(&item.id);
        }
    }

    fn save_packing_state(&self) {
        if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::PACKED_ITEMS, &self.packed) {
            tracing::warn!("Failed to save packing state: {}", e);
        }
    }

    fn read_mirror(&self) -> Option<Vec<InfoItem>> {
        match load_json::<Vec<InfoItem>>(self.ctx.cache.as_ref(), keys::TRAVEL_INFO) {
            Ok(items) => items.map(|mut items| {
                for item in &mut items {
                    item.refresh_derived();
                }
                items
            }),
            Err(e) => {
                tracing::warn!("Cached travel info unreadable: {}", e);
                None
            }
        }
    }
}
