//! Itinerary days, search and completion tracking.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use super::state::{LoadError, LoadOutcome, LoadState};
use super::{fetch_records, StoreContext};
use crate::cache::{keys, load_json, save_json};
use crate::ingest;
use crate::models::{ItineraryDay, ItineraryItem};
use crate::search::{matches_search_query, tag_statistics};

/// Completion flags by itinerary item id.
pub type CompletedItems = BTreeMap<String, bool>;

pub struct ItineraryStore {
    ctx: StoreContext,
    sheet_gid: String,
    days: Vec<ItineraryDay>,
    current_date: Option<NaiveDate>,
    search_query: String,
    completed: CompletedItems,
    state: LoadState,
}

impl ItineraryStore {
    /// Builds the store, restoring completion flags and the cached days.
    pub fn new(ctx: StoreContext, sheet_gid: impl Into<String>) -> Self {
        let mut store = Self {
            ctx,
            sheet_gid: sheet_gid.into(),
            days: Vec::new(),
            current_date: None,
            search_query: String::new(),
            completed: CompletedItems::new(),
            state: LoadState::Unloaded,
        };
        store.restore_completion_state();
        if let Some(items) = store.read_mirror() {
            store.install(items);
        }
        store
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Days in date order.
    pub fn days(&self) -> &[ItineraryDay] {
        &self.days
    }

    pub fn available_dates(&self) -> Vec<NaiveDate> {
        self.days.iter().map(|day| day.date).collect()
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.current_date
    }

    pub fn current_day(&self) -> Option<&ItineraryDay> {
        let date = self.current_date?;
        self.days.iter().find(|day| day.date == date)
    }

    pub fn current_day_items(&self) -> &[ItineraryItem] {
        self.current_day().map(|day| day.items.as_slice()).unwrap_or_default()
    }

    /// Fetches the itinerary tab and regroups it by date.
    pub async fn load_from_source(&mut self) -> Result<LoadOutcome, LoadError> {
        self.state = LoadState::Loading;

        let clock = self.ctx.clock.clone();
        let result = fetch_records(self.ctx.source.as_ref(), &self.sheet_gid, |csv| {
            ingest::parse_itinerary(csv, clock.as_ref())
        })
        .await;

        match result {
            Ok(items) => {
                let count = items.len();
                if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::ITINERARY, &items) {
                    tracing::warn!("Failed to cache itinerary: {}", e);
                }
                self.install(items);
                self.state = LoadState::Ready;
                tracing::info!("Loaded {} itinerary items over {} days", count, self.days.len());
                Ok(LoadOutcome::Fresh { count })
            }
            Err(e) => {
                self.state = LoadState::Error(e.to_string());
                match self.read_mirror() {
                    Some(items) => {
                        let count = items.len();
                        self.install(items);
                        tracing::warn!("Itinerary load failed, showing cached copy: {}", e);
                        Ok(LoadOutcome::Cached {
                            count,
                            error: e.to_string(),
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Moves to `date` if the itinerary has it.
    pub fn switch_date(&mut self, date: NaiveDate) -> bool {
        if self.days.iter().any(|day| day.date == date) {
            self.current_date = Some(date);
            return true;
        }
        false
    }

    pub fn previous_day(&mut self) -> bool {
        match self.current_index() {
            Some(index) if index > 0 => {
                self.current_date = Some(self.days[index - 1].date);
                true
            }
            _ => false,
        }
    }

    pub fn next_day(&mut self) -> bool {
        match self.current_index() {
            Some(index) if index + 1 < self.days.len() => {
                self.current_date = Some(self.days[index + 1].date);
                true
            }
            _ => false,
        }
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// The current day's items matching the search query.
    pub fn filtered_items(&self) -> Vec<&ItineraryItem> {
        self.current_day_items()
            .iter()
            .filter(|item| matches_search_query(item, &self.search_query))
            .collect()
    }

    /// Tag usage across every day.
    pub fn tag_statistics(&self) -> Vec<(String, usize)> {
        tag_statistics(self.days.iter().flat_map(|day| day.items.iter()))
    }

    /// Planned spend for the current day.
    pub fn total_cost(&self) -> f64 {
        self.current_day().map(|day| day.total_cost).unwrap_or(0.0)
    }

    /// Share of the current day's items marked done, as a rounded percent.
    pub fn completion_percentage(&self) -> u32 {
        let items = self.current_day_items();
        if items.is_empty() {
            return 0;
        }
        let done = items.iter().filter(|item| item.is_completed).count();
        ((done as f64 / items.len() as f64) * 100.0).round() as u32
    }

    /// Marks an item done or not done and persists the flag.
    pub fn toggle_complete(&mut self, item_id: &str, completed: bool) {
        self.completed.insert(item_id.to_string(), completed);
        self.save_completion_state();

        for day in &mut self.days {
            if let Some(item) = day.items.iter_mut().find(|item| item.id == item_id) {
                item.is_completed = completed;
                day.recompute();
            }
        }
    }

    pub fn clear_completion_state(&mut self) {
        self.completed.clear();
        if let Err(e) = self.ctx.cache.remove(keys::COMPLETED_ITEMS) {
            tracing::warn!("Failed to clear completion state: {}", e);
        }
        for day in &mut self.days {
            for item in &mut day.items {
                item.is_completed = false;
            }
            day.recompute();
        }
    }

    /// Reloads completion flags from the cache and applies them to the
    /// loaded days. Unreadable flags are dropped.
    pub fn restore_completion_state(&mut self) {
        self.completed = match load_json(self.ctx.cache.as_ref(), keys::COMPLETED_ITEMS) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not restore completion state: {}", e);
                CompletedItems::new()
            }
        };

        for day in &mut self.days {
            for item in &mut day.items {
                item.is_completed = self.completed.get(&item.id).copied().unwrap_or(false);
            }
            day.recompute();
        }
    }

    fn save_completion_state(&self) {
        if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::COMPLETED_ITEMS, &self.completed) {
            tracing::warn!("Failed to save completion state: {}", e);
        }
    }

    fn current_index(&self) -> Option<usize> {
        let date = self.current_date?;
        self.days.iter().position(|day| day.date == date)
    }

    fn read_mirror(&self) -> Option<Vec<ItineraryItem>> {
        match load_json(self.ctx.cache.as_ref(), keys::ITINERARY) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Cached itinerary unreadable: {}", e);
                None
            }
        }
    }

    /// Groups items into days, re-deriving computed fields and completion.
    fn install(&mut self, items: Vec<ItineraryItem>) {
        let today = self.ctx.clock.today();
        let mut by_date: BTreeMap<NaiveDate, Vec<ItineraryItem>> = BTreeMap::new();
        for mut item in items {
            item.refresh_derived(today);
            item.is_completed = self.completed.get(&item.id).copied().unwrap_or(false);
            by_date.entry(item.date).or_default().push(item);
        }

        let notes: HashMap<NaiveDate, Option<String>> = self
            .days
            .drain(..)
            .map(|day| (day.date, day.notes))
            .collect();
        self.days = by_date
            .into_iter()
            .map(|(date, items)| {
                let mut day = ItineraryDay::new(date, items);
                day.notes = notes.get(&date).cloned().flatten();
                day
            })
            .collect();

        let keep_current = self
            .current_date
            .is_some_and(|date| self.days.iter().any(|day| day.date == date));
        if !keep_current {
            self.current_date = self.days.first().map(|day| day.date);
        }
    }
}
