//! Shopping lists attached to itinerary entries.
//!
//! Each itinerary entry can own a list of things to buy there. Items can be
//! checked off as they are bought. The list totals are derived from the items
//! and are recomputed by every mutating method on [`ShoppingList`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currency assumed when none is given.
pub const DEFAULT_CURRENCY: &str = "TWD";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub id: String,
    /// The itinerary entry this item belongs to (not owned)
    pub itinerary_item_id: String,
    pub name: String,
    pub is_completed: bool,
    pub note: Option<String>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub estimated_amount: Option<f64>,
    pub currency: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_by: Option<String>,
    pub last_updated_at: DateTime<Utc>,
}

impl ShoppingItem {
    pub fn new(
        id: impl Into<String>,
        itinerary_item_id: impl Into<String>,
        name: impl Into<String>,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let created_by = created_by.into();
        Self {
            id: id.into(),
            itinerary_item_id: itinerary_item_id.into(),
            name: name.into(),
            is_completed: false,
            note: None,
            quantity: None,
            unit: None,
            estimated_amount: None,
            currency: DEFAULT_CURRENCY.to_string(),
            last_updated_by: Some(created_by.clone()),
            created_by,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Stamps an edit, keeping `last_updated_at >= created_at`.
    pub fn touch(&mut self, updated_by: Option<&str>, now: DateTime<Utc>) {
        self.last_updated_by = updated_by.map(str::to_string);
        self.last_updated_at = now.max(self.created_at);
    }
}

impl fmt::Display for ShoppingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check = if self.is_completed { "[x]" } else { "[ ]" };
        write!(f, "{} {}", check, self.name)?;
        match (self.quantity, &self.unit) {
            (Some(qty), Some(unit)) => write!(f, " x{} {}", qty, unit)?,
            (Some(qty), None) => write!(f, " x{}", qty)?,
            _ => {}
        }
        if let Some(amount) = self.estimated_amount {
            write!(f, " ({} {})", amount, self.currency)?;
        }
        Ok(())
    }
}

/// A partial item, as carried by queued writes and update requests.
///
/// Absent fields mean "unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itinerary_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl ShoppingItemPatch {
    /// Shallow merge: every field set in `newer` wins.
    pub fn merge(self, newer: ShoppingItemPatch) -> ShoppingItemPatch {
        ShoppingItemPatch {
            id: newer.id.or(self.id),
            itinerary_item_id: newer.itinerary_item_id.or(self.itinerary_item_id),
            name: newer.name.or(self.name),
            is_completed: newer.is_completed.or(self.is_completed),
            note: newer.note.or(self.note),
            quantity: newer.quantity.or(self.quantity),
            unit: newer.unit.or(self.unit),
            estimated_amount: newer.estimated_amount.or(self.estimated_amount),
            currency: newer.currency.or(self.currency),
            created_by: newer.created_by.or(self.created_by),
            created_at: newer.created_at.or(self.created_at),
            last_updated_by: newer.last_updated_by.or(self.last_updated_by),
            last_updated_at: newer.last_updated_at.or(self.last_updated_at),
        }
    }

    /// Copies the editable fields onto `item`. Identity and creation fields
    /// are left alone.
    pub fn apply_to(&self, item: &mut ShoppingItem) {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(done) = self.is_completed {
            item.is_completed = done;
        }
        if let Some(note) = &self.note {
            item.note = Some(note.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(qty) = self.quantity {
            item.quantity = Some(qty);
        }
        if let Some(unit) = &self.unit {
            item.unit = Some(unit.clone());
        }
        if let Some(amount) = self.estimated_amount {
            item.estimated_amount = Some(amount);
        }
        if let Some(currency) = &self.currency {
            item.currency = currency.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ShoppingItemPatch::default()
    }
}

impl From<&ShoppingItem> for ShoppingItemPatch {
    /// A full snapshot of the item.
    fn from(item: &ShoppingItem) -> Self {
        Self {
            id: Some(item.id.clone()),
            itinerary_item_id: Some(item.itinerary_item_id.clone()),
            name: Some(item.name.clone()),
            is_completed: Some(item.is_completed),
            note: item.note.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            estimated_amount: item.estimated_amount,
            currency: Some(item.currency.clone()),
            created_by: Some(item.created_by.clone()),
            created_at: Some(item.created_at),
            last_updated_by: item.last_updated_by.clone(),
            last_updated_at: Some(item.last_updated_at),
        }
    }
}

/// Sum of estimated amounts, counting missing amounts as zero.
pub fn compute_total_estimated_amount(items: &[ShoppingItem]) -> f64 {
    items.iter().map(|i| i.estimated_amount.unwrap_or(0.0)).sum()
}

pub fn compute_completed_count(items: &[ShoppingItem]) -> usize {
    items.iter().filter(|i| i.is_completed).count()
}

/// The shopping list of one itinerary entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    itinerary_item_id: String,
    items: Vec<ShoppingItem>,
    total_estimated_amount: f64,
    completed_count: usize,
}

impl ShoppingList {
    pub fn new(itinerary_item_id: impl Into<String>) -> Self {
        Self {
            itinerary_item_id: itinerary_item_id.into(),
            items: Vec::new(),
            total_estimated_amount: 0.0,
            completed_count: 0,
        }
    }

    pub fn from_items(itinerary_item_id: impl Into<String>, items: Vec<ShoppingItem>) -> Self {
        let mut list = Self::new(itinerary_item_id);
        list.items = items;
        list.recompute();
        list
    }

    pub fn itinerary_item_id(&self) -> &str {
        &self.itinerary_item_id
    }

    pub fn items(&self) -> &[ShoppingItem] {
        &self.items
    }

    pub fn total_estimated_amount(&self) -> f64 {
        self.total_estimated_amount
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn find(&self, item_id: &str) -> Option<&ShoppingItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn push(&mut self, item: ShoppingItem) {
        self.items.push(item);
        self.recompute();
    }

    /// Runs `edit` on the item with `item_id`, then recomputes the totals.
    /// Returns a copy of the edited item, or `None` if it isn't in this list.
    pub fn edit<F>(&mut self, item_id: &str, edit: F) -> Option<ShoppingItem>
    where
        F: FnOnce(&mut ShoppingItem),
    {
        let item = self.items.iter_mut().find(|i| i.id == item_id)?;
        edit(item);
        let edited = item.clone();
        self.recompute();
        Some(edited)
    }

    /// Removes an item by id. Returns the removed item.
    pub fn remove(&mut self, item_id: &str) -> Option<ShoppingItem> {
        let index = self.items.iter().position(|i| i.id == item_id)?;
        let removed = self.items.remove(index);
        self.recompute();
        Some(removed)
    }

    pub fn into_items(self) -> Vec<ShoppingItem> {
        self.items
    }

    fn recompute(&mut self) {
        self.total_estimated_amount = compute_total_estimated_amount(&self.items);
        self.completed_count = compute_completed_count(&self.items);
    }
}

/// Serialized form of all lists: itinerary item id -> items.
pub type ShoppingListState = BTreeMap<String, Vec<ShoppingItem>>;
