use chrono::{DateTime, NaiveDate, Utc};

use super::rows::{parse_flag, Row};
use super::ParsingError;
use crate::models::{AuthConfig, AuthItem};

const COL_PASSWORD: &str = "密碼";
const COL_DESCRIPTION: &str = "說明文字";
const COL_EXPIRY: &str = "有效期限";
const COL_SENIOR_MODE: &str = "年長者模式";

pub(crate) fn build_auth_config(
    rows: &[Row],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<AuthConfig, ParsingError> {
    let items: Vec<AuthItem> = rows
        .iter()
        .filter_map(|row| build_item(row, today))
        .collect();

    if items.is_empty() {
        return Err(ParsingError::NoCredentials);
    }

    let config = AuthConfig::new(items, now);
    if config.valid_count() == 0 {
        return Err(ParsingError::AllCredentialsExpired);
    }

    Ok(config)
}

fn build_item(row: &Row, today: NaiveDate) -> Option<AuthItem> {
    let Some(password) = row.cell(COL_PASSWORD) else {
        tracing::warn!(line = row.line, "Missing password, skipping auth row");
        return None;
    };

    let mut item = AuthItem::new(password);
    item.description = row.text(COL_DESCRIPTION);
    item.expiry_date = row.text(COL_EXPIRY);
    item.is_senior_mode = parse_flag(row.cell(COL_SENIOR_MODE));
    item.refresh_derived(today);

    Some(item)
}
