use uuid::Uuid;

use super::rows::{parse_integer, Row};
use crate::models::{InfoItem, DEFAULT_INFO_CATEGORY};

const COL_TITLE: &str = "標題";
const COL_CATEGORY: &str = "類別";
const COL_CONTENT: &str = "內容";
const COL_AMOUNT: &str = "數量";
const COL_CONTACT: &str = "聯絡人姓名";
const COL_PHONE: &str = "電話";
const COL_ADDRESS: &str = "地址";
const COL_LINKS: &str = "連結";
const COL_NOTES: &str = "備註";

pub(crate) fn build_travel_info(rows: &[Row]) -> Vec<InfoItem> {
    rows.iter().filter_map(build_item).collect()
}

fn build_item(row: &Row) -> Option<InfoItem> {
    let Some(title) = row.cell(COL_TITLE) else {
        tracing::warn!(line = row.line, "Missing title, skipping travel info row");
        return None;
    };

    let category = row.cell(COL_CATEGORY).unwrap_or(DEFAULT_INFO_CATEGORY);
    let mut item = InfoItem::new(Uuid::new_v4().to_string(), title, category);
    item.content = row.text(COL_CONTENT);
    item.amount = parse_integer(row.cell(COL_AMOUNT));
    item.contact_name = row.text(COL_CONTACT);
    item.phone = row.text(COL_PHONE);
    item.address = row.text(COL_ADDRESS);
    item.links = row.text(COL_LINKS);
    item.notes = row.text(COL_NOTES);
    item.refresh_derived();

    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_links() {
        let rows = [
            Row::from_pairs(
                2,
                &[
                    (COL_TITLE, "護照"),
                    (COL_CATEGORY, "打包清單"),
                    (COL_AMOUNT, "2"),
                ],
            ),
            Row::from_pairs(
                3,
                &[(COL_TITLE, "飯店"), (COL_LINKS, "https://h.example, ,https://m.example")],
            ),
            Row::from_pairs(4, &[(COL_CATEGORY, "住宿")]),
        ];

        let items = build_travel_info(&rows);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].amount, Some(2));
        assert!(items[0].is_packing_item());
        assert!(!items[0].is_packed);
        assert_eq!(items[1].category, DEFAULT_INFO_CATEGORY);
        assert_eq!(items[1].link_list.len(), 2);
    }
}
