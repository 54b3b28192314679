//! Itinerary entries and per-day groupings.
//!
//! Items come from the itinerary sheet. The list-valued and "today" fields
//! are derived from the raw cells and are never read back from storage;
//! [`ItineraryItem::refresh_derived`] rebuilds them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::split_delimited;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryItem {
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
    pub category: Option<String>,
    /// Free-form time of day, usually `HH:mm`
    pub time: Option<String>,
    pub location: Option<String>,
    pub map_link: Option<String>,
    pub cost: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    /// Raw comma-joined links
    pub links: Option<String>,
    /// Raw comma-joined tags
    pub tags: Option<String>,
    pub notes: Option<String>,
    pub card_color: Option<String>,
    pub card_background_image: Option<String>,
    pub is_completed: bool,
    #[serde(skip_deserializing, default)]
    pub is_today: bool,
    #[serde(skip_deserializing, default)]
    pub tag_list: Vec<String>,
    #[serde(skip_deserializing, default)]
    pub link_list: Vec<String>,
}

impl ItineraryItem {
    pub fn new(id: impl Into<String>, date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date,
            title: title.into(),
            category: None,
            time: None,
            location: None,
            map_link: None,
            cost: None,
            currency: None,
            description: None,
            links: None,
            tags: None,
            notes: None,
            card_color: None,
            card_background_image: None,
            is_completed: false,
            is_today: false,
            tag_list: Vec::new(),
            link_list: Vec::new(),
        }
    }

    /// Recomputes every derived field from the raw ones.
    pub fn refresh_derived(&mut self, today: NaiveDate) {
        self.is_today = compute_is_today(self, today);
        self.tag_list = compute_tag_list(self);
        self.link_list = compute_link_list(self);
    }
}

pub fn compute_is_today(item: &ItineraryItem, today: NaiveDate) -> bool {
    item.date == today
}

pub fn compute_tag_list(item: &ItineraryItem) -> Vec<String> {
    split_delimited(item.tags.as_deref())
}

pub fn compute_link_list(item: &ItineraryItem) -> Vec<String> {
    split_delimited(item.links.as_deref())
}

/// All items planned for one date.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub date: NaiveDate,
    pub items: Vec<ItineraryItem>,
    pub notes: Option<String>,
    pub total_cost: f64,
    pub completed_count: usize,
}

impl ItineraryDay {
    pub fn new(date: NaiveDate, items: Vec<ItineraryItem>) -> Self {
        let mut day = Self {
            date,
            items,
            notes: None,
            total_cost: 0.0,
            completed_count: 0,
        };
        day.recompute();
        day
    }

    /// Refreshes `total_cost` and `completed_count` from the items.
    pub fn recompute(&mut self) {
        self.total_cost = self.items.iter().map(|i| i.cost.unwrap_or(0.0)).sum();
        self.completed_count = self.items.iter().filter(|i| i.is_completed).count();
    }
}
