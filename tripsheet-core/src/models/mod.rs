mod auth;
mod itinerary;
mod shopping;
mod travel_info;

pub use auth::{compute_is_valid, AuthConfig, AuthItem, AuthState, AUTH_DATA_VERSION};
pub use itinerary::{
    compute_is_today, compute_link_list, compute_tag_list, ItineraryDay, ItineraryItem,
};
pub use shopping::{
    compute_completed_count, compute_total_estimated_amount, ShoppingItem, ShoppingItemPatch,
    ShoppingList, ShoppingListState, DEFAULT_CURRENCY,
};
pub use travel_info::{compute_info_link_list, InfoItem, DEFAULT_INFO_CATEGORY, PACKING_CATEGORY};

/// Splits a comma-joined cell into trimmed, non-empty parts.
pub fn split_delimited(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
