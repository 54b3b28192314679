//! Free-text search and tag counts over itinerary items.

use std::collections::HashMap;

use crate::models::ItineraryItem;

/// Case-insensitive substring match against the item's text fields.
///
/// A blank query matches everything.
pub fn matches_search_query(item: &ItineraryItem, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    let fields = [
        Some(item.title.as_str()),
        item.location.as_deref(),
        item.description.as_deref(),
        item.tags.as_deref(),
        item.category.as_deref(),
        item.notes.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&query))
}

pub fn search_itinerary_items<'a>(items: &'a [ItineraryItem], query: &str) -> Vec<&'a ItineraryItem> {
    items
        .iter()
        .filter(|item| matches_search_query(item, query))
        .collect()
}

/// How often each tag is used, most used first. Ties sort by tag.
pub fn tag_statistics<'a>(items: impl IntoIterator<Item = &'a ItineraryItem>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        for tag in &item.tag_list {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }

    let mut stats: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(title: &str, tags: &str) -> ItineraryItem {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut item = ItineraryItem::new(title, today, title);
        item.tags = Some(tags.to_string());
        item.refresh_derived(today);
        item
    }

    #[test]
    fn test_search_fields() {
        let mut skytree = item("Tokyo Skytree", "夜景");
        skytree.location = Some("Sumida".to_string());
        let mut market = item("Tsukiji", "美食");
        market.notes = Some("Go early for SUSHI".to_string());
        let items = vec![skytree, market];

        assert_eq!(search_itinerary_items(&items, "skytree").len(), 1);
        assert_eq!(search_itinerary_items(&items, "sumida")[0].title, "Tokyo Skytree");
        assert_eq!(search_itinerary_items(&items, "sushi")[0].title, "Tsukiji");
        assert_eq!(search_itinerary_items(&items, "美食").len(), 1);
        assert_eq!(search_itinerary_items(&items, "  ").len(), 2);
        assert!(search_itinerary_items(&items, "osaka").is_empty());
    }

    #[test]
    fn test_tag_statistics() {
        let items = vec![
            item("a", "food,night"),
            item("b", "food"),
            item("c", "art, night,food"),
        ];

        let stats = tag_statistics(&items);
        assert_eq!(
            stats,
            vec![
                ("food".to_string(), 3),
                ("night".to_string(), 2),
                ("art".to_string(), 1),
            ]
        );
    }
}
