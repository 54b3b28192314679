use serde::{Deserialize, Serialize};

use super::split_delimited;

/// Category used when a row leaves it blank.
pub const DEFAULT_INFO_CATEGORY: &str = "其他";

/// Category whose items can be ticked off as packed.
pub const PACKING_CATEGORY: &str = "打包清單";

/// One entry from the travel-info sheet (lodging, tickets, contacts, packing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfoItem {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: Option<String>,
    pub is_packed: bool,
    pub amount: Option<i64>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub links: Option<String>,
    pub notes: Option<String>,
    #[serde(skip_deserializing, default)]
    pub link_list: Vec<String>,
}

impl InfoItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            content: None,
            is_packed: false,
            amount: None,
            contact_name: None,
            phone: None,
            address: None,
            links: None,
            notes: None,
            link_list: Vec::new(),
        }
    }

    pub fn refresh_derived(&mut self) {
        self.link_list = compute_info_link_list(self);
    }

    pub fn is_packing_item(&self) -> bool {
        self.category == PACKING_CATEGORY
    }
}

pub fn compute_info_link_list(item: &InfoItem) -> Vec<String> {
    split_delimited(item.links.as_deref())
}
