use chrono::{DateTime, Utc};

use super::rows::{parse_count, parse_decimal, parse_flag, Row};
use crate::models::{ShoppingItem, DEFAULT_CURRENCY};

const COL_ID: &str = "id";
const COL_ITINERARY_ITEM_ID: &str = "itineraryItemId";
const COL_NAME: &[&str] = &["itemName", "name"];
const COL_IS_COMPLETED: &str = "isCompleted";
const COL_QUANTITY: &str = "quantity";
const COL_UNIT: &str = "unit";
const COL_AMOUNT: &[&str] = &["estimatedAmount", "estimatedCost"];
const COL_CURRENCY: &str = "currency";
const COL_NOTE: &[&str] = &["notes", "note"];
const COL_CREATED_BY: &str = "createdBy";
const COL_CREATED_AT: &str = "createdAt";
const COL_UPDATED_BY: &str = "lastUpdatedBy";
const COL_UPDATED_AT: &str = "lastUpdatedAt";

/// Author recorded when the sheet leaves `createdBy` blank.
const DEFAULT_CREATED_BY: &str = "user";

/// Builds shopping items. Ids come from the sheet verbatim since they must
/// match the remote rows that later writes address.
pub(crate) fn build_shopping_list(rows: &[Row], now: DateTime<Utc>) -> Vec<ShoppingItem> {
    rows.iter().filter_map(|row| build_item(row, now)).collect()
}

fn build_item(row: &Row, now: DateTime<Utc>) -> Option<ShoppingItem> {
    let (Some(id), Some(itinerary_item_id), Some(name)) = (
        row.cell(COL_ID),
        row.cell(COL_ITINERARY_ITEM_ID),
        row.first_cell(COL_NAME),
    ) else {
        tracing::warn!(
            line = row.line,
            "Missing id, itineraryItemId or itemName, skipping shopping row"
        );
        return None;
    };

    let created_at = parse_timestamp(row.cell(COL_CREATED_AT)).unwrap_or(now);
    let last_updated_at = parse_timestamp(row.cell(COL_UPDATED_AT))
        .unwrap_or(created_at)
        .max(created_at);

    Some(ShoppingItem {
        id: id.to_string(),
        itinerary_item_id: itinerary_item_id.to_string(),
        name: name.to_string(),
        is_completed: parse_flag(row.cell(COL_IS_COMPLETED)),
        note: row.first_text(COL_NOTE),
        quantity: parse_count(row.cell(COL_QUANTITY)),
        unit: row.text(COL_UNIT),
        estimated_amount: parse_decimal(row.first_cell(COL_AMOUNT)),
        currency: row
            .text(COL_CURRENCY)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        created_by: row
            .text(COL_CREATED_BY)
            .unwrap_or_else(|| DEFAULT_CREATED_BY.to_string()),
        created_at,
        last_updated_by: row.text(COL_UPDATED_BY),
        last_updated_at,
    })
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
