//! CSV ingestion.
//!
//! Spreadsheet exports arrive as loosely-typed text. [`parse`] turns them into
//! validated domain records, skipping (and logging) rows that are missing
//! required fields. Only structural problems abort a whole batch.

mod auth;
mod error;
mod itinerary;
mod rows;
mod shopping;
mod source;
mod travel_info;

use std::fmt;

use crate::clock::Clock;
use crate::models::{AuthConfig, InfoItem, ItineraryItem, ShoppingItem};

pub use error::ParsingError;
pub use source::{CsvSource, HttpCsvSource, SheetError, DEFAULT_EXPORT_BASE_URL};

/// Which record shape a CSV export holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Itinerary,
    TravelInfo,
    AuthConfig,
    ShoppingList,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Itinerary => write!(f, "itinerary"),
            RecordType::TravelInfo => write!(f, "travel info"),
            RecordType::AuthConfig => write!(f, "auth config"),
            RecordType::ShoppingList => write!(f, "shopping list"),
        }
    }
}

/// The validated output of one CSV export.
#[derive(Debug, Clone)]
pub enum Records {
    Itinerary(Vec<ItineraryItem>),
    TravelInfo(Vec<InfoItem>),
    AuthConfig(AuthConfig),
    ShoppingList(Vec<ShoppingItem>),
}

impl Records {
    pub fn record_type(&self) -> RecordType {
        match self {
            Records::Itinerary(_) => RecordType::Itinerary,
            Records::TravelInfo(_) => RecordType::TravelInfo,
            Records::AuthConfig(_) => RecordType::AuthConfig,
            Records::ShoppingList(_) => RecordType::ShoppingList,
        }
    }

    /// Number of records produced.
    pub fn len(&self) -> usize {
        match self {
            Records::Itinerary(items) => items.len(),
            Records::TravelInfo(items) => items.len(),
            Records::AuthConfig(config) => config.items.len(),
            Records::ShoppingList(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses `csv_text` as the given record type.
pub fn parse(
    csv_text: &str,
    record_type: RecordType,
    clock: &dyn Clock,
) -> Result<Records, ParsingError> {
    let records = match record_type {
        RecordType::Itinerary => Records::Itinerary(parse_itinerary(csv_text, clock)?),
        RecordType::TravelInfo => Records::TravelInfo(parse_travel_info(csv_text)?),
        RecordType::AuthConfig => Records::AuthConfig(parse_auth_config(csv_text, clock)?),
        RecordType::ShoppingList => Records::ShoppingList(parse_shopping_list(csv_text, clock)?),
    };
    tracing::debug!("Parsed {} {} records", records.len(), record_type);
    Ok(records)
}

pub fn parse_itinerary(
    csv_text: &str,
    clock: &dyn Clock,
) -> Result<Vec<ItineraryItem>, ParsingError> {
    let rows = rows::read_rows(csv_text)?;
    require_rows(
        itinerary::build_itinerary(&rows, clock.today()),
        RecordType::Itinerary,
    )
}

pub fn parse_travel_info(csv_text: &str) -> Result<Vec<InfoItem>, ParsingError> {
    let rows = rows::read_rows(csv_text)?;
    require_rows(travel_info::build_travel_info(&rows), RecordType::TravelInfo)
}

/// Parses the credential sheet. Fails unless at least one credential is
/// still valid today.
pub fn parse_auth_config(csv_text: &str, clock: &dyn Clock) -> Result<AuthConfig, ParsingError> {
    let rows = rows::read_rows(csv_text)?;
    auth::build_auth_config(&rows, clock.today(), clock.now())
}

pub fn parse_shopping_list(
    csv_text: &str,
    clock: &dyn Clock,
) -> Result<Vec<ShoppingItem>, ParsingError> {
    let rows = rows::read_rows(csv_text)?;
    require_rows(
        shopping::build_shopping_list(&rows, clock.now()),
        RecordType::ShoppingList,
    )
}

fn require_rows<T>(items: Vec<T>, record_type: RecordType) -> Result<Vec<T>, ParsingError> {
    if items.is_empty() {
        return Err(ParsingError::NoUsableRows(record_type));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn clock() -> ManualClock {
        ManualClock::at_date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
    }

    #[test]
    fn test_row_missing_date_is_dropped() {
        let csv = "日期,標題\n2025-01-15,Tokyo Skytree\n,Missing Date\n";

        let items = parse_itinerary(csv, &clock()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Tokyo Skytree");
        assert_eq!(crate::dates::format_date(items[0].date), "2025-01-15");
    }

    #[test]
    fn test_no_usable_rows() {
        let csv = "日期,標題\n,Missing Date\n2025-01-15,\n";

        let err = parse_itinerary(csv, &clock()).unwrap_err();
        assert_eq!(err, ParsingError::NoUsableRows(RecordType::Itinerary));
        assert_eq!(err.to_string(), "No usable itinerary rows in CSV data");
    }

    #[test]
    fn test_malformed_reports_line() {
        let csv = "日期,標題\n2025-01-15,A\n2025-01-16,B,extra\n";

        let err = parse_itinerary(csv, &clock()).unwrap_err();
        assert_eq!(err.to_string(), "CSV parse error at line 3: expected 2 fields, found 3");
    }

    #[test]
    fn test_parse_dispatches_on_record_type() {
        let clock = clock();

        let records = parse("標題,類別\n護照,打包清單\n", RecordType::TravelInfo, &clock).unwrap();
        assert_eq!(records.record_type(), RecordType::TravelInfo);
        assert_eq!(records.len(), 1);

        let records = parse("密碼,有效期限\nsecret,2025-02-01\n", RecordType::AuthConfig, &clock)
            .unwrap();
        match records {
            Records::AuthConfig(config) => assert_eq!(config.valid_count(), 1),
            other => panic!("expected auth config, got {:?}", other.record_type()),
        }

        let csv = "id,itineraryItemId,itemName\ns-1,trip-1,Pocky\n";
        let records = parse(csv, RecordType::ShoppingList, &clock).unwrap();
        assert!(matches!(records, Records::ShoppingList(ref items) if items[0].id == "s-1"));
    }

    #[test]
    fn test_reparse_is_stable_apart_from_generated_ids() {
        let clock = clock();
        let csv = "日期,標題,標籤\n2025-01-15,A,\"x, y\"\n";

        let first = parse_itinerary(csv, &clock).unwrap();
        let second = parse_itinerary(csv, &clock).unwrap();
        assert_eq!(first[0].tag_list, second[0].tag_list);
        assert_eq!(first[0].is_today, second[0].is_today);
    }
}
