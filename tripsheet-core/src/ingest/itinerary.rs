use chrono::NaiveDate;
use uuid::Uuid;

use super::rows::{parse_decimal, Row};
use crate::dates::parse_date;
use crate::models::ItineraryItem;

pub(crate) const COL_DATE: &str = "日期";
pub(crate) const COL_TITLE: &str = "標題";
const COL_ID: &[&str] = &["id", "ID"];
const COL_CATEGORY: &str = "類別";
const COL_TIME: &str = "時間";
const COL_LOCATION: &str = "地點";
const COL_MAP_LINK: &[&str] = &["Google Maps", "GoogleMaps"];
const COL_COST: &str = "花費";
const COL_CURRENCY: &str = "幣別";
const COL_DESCRIPTION: &str = "說明";
const COL_LINKS: &str = "連結";
const COL_TAGS: &str = "標籤";
const COL_NOTES: &str = "備註";
const COL_CARD_COLOR: &str = "卡片顏色";
const COL_CARD_IMAGE: &str = "卡片背景圖片";

pub(crate) fn build_itinerary(rows: &[Row], today: NaiveDate) -> Vec<ItineraryItem> {
    rows.iter()
        .filter_map(|row| build_item(row, today))
        .collect()
}

fn build_item(row: &Row, today: NaiveDate) -> Option<ItineraryItem> {
    let (Some(raw_date), Some(title)) = (row.cell(COL_DATE), row.cell(COL_TITLE)) else {
        tracing::warn!(line = row.line, "Missing date or title, skipping itinerary row");
        return None;
    };

    let date = match parse_date(raw_date) {
        Ok(date) => date,
        Err(e) => {
            tracing::warn!(line = row.line, "{}, skipping itinerary row", e);
            return None;
        }
    };

    let id = row
        .first_text(COL_ID)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut item = ItineraryItem::new(id, date, title);
    item.category = row.text(COL_CATEGORY);
    item.time = row.text(COL_TIME);
    item.location = row.text(COL_LOCATION);
    item.map_link = row.first_text(COL_MAP_LINK);
    item.cost = parse_decimal(row.cell(COL_COST));
    item.currency = row.text(COL_CURRENCY);
    item.description = row.text(COL_DESCRIPTION);
    item.links = row.text(COL_LINKS);
    item.tags = row.text(COL_TAGS);
    item.notes = row.text(COL_NOTES);
    item.card_color = row.text(COL_CARD_COLOR);
    item.card_background_image = row.text(COL_CARD_IMAGE);
    item.refresh_derived(today);

    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_full_row() {
        let row = Row::from_pairs(
            2,
            &[
                (COL_DATE, "2025-01-15"),
                (COL_TITLE, " Tokyo Skytree "),
                (COL_CATEGORY, "景點"),
                (COL_TIME, "09:30"),
                ("GoogleMaps", "https://maps.example/skytree"),
                (COL_COST, "3100"),
                (COL_CURRENCY, "JPY"),
                (COL_TAGS, "室內,夜景"),
                (COL_LINKS, "https://a.example"),
                (COL_CARD_COLOR, "#ffeecc"),
            ],
        );

        let items = build_itinerary(&[row], today());
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "Tokyo Skytree");
        assert_eq!(item.category.as_deref(), Some("景點"));
        assert_eq!(item.map_link.as_deref(), Some("https://maps.example/skytree"));
        assert_eq!(item.cost, Some(3100.0));
        assert_eq!(item.tag_list, vec!["室內", "夜景"]);
        assert_eq!(item.link_list, vec!["https://a.example"]);
        assert_eq!(item.card_color.as_deref(), Some("#ffeecc"));
        assert!(item.is_today);
        assert!(!item.is_completed);
        assert!(Uuid::parse_str(&item.id).is_ok());
    }

    #[test]
    fn test_bad_cost_is_absent() {
        let row = Row::from_pairs(
            2,
            &[(COL_DATE, "2025-01-15"), (COL_TITLE, "A"), (COL_COST, "free")],
        );
        let items = build_itinerary(&[row], today());
        assert_eq!(items[0].cost, None);
    }

    #[test]
    fn test_skips_invalid_date() {
        let rows = [
            Row::from_pairs(2, &[(COL_DATE, "2025/01/15"), (COL_TITLE, "A")]),
            Row::from_pairs(3, &[(COL_DATE, "2025-13-01"), (COL_TITLE, "B")]),
            Row::from_pairs(4, &[(COL_DATE, "2025-01-16"), (COL_TITLE, "C")]),
        ];
        let items = build_itinerary(&rows, today());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "C");
        assert!(!items[0].is_today);
    }

    #[test]
    fn test_row_supplied_id_is_kept() {
        let row = Row::from_pairs(
            2,
            &[("id", "day1-am"), (COL_DATE, "2025-01-15"), (COL_TITLE, "A")],
        );
        let items = build_itinerary(&[row], today());
        assert_eq!(items[0].id, "day1-am");
    }

    #[test]
    fn test_duplicate_rows_get_distinct_ids() {
        let row = Row::from_pairs(2, &[(COL_DATE, "2025-01-15"), (COL_TITLE, "Same")]);
        let items = build_itinerary(&[row.clone(), row], today());
        assert_eq!(items.len(), 2);
        assert_ne!(items[0].id, items[1].id);
    }
}
