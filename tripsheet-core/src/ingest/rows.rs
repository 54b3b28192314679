//! Header-keyed CSV rows and lenient cell readers.

use std::collections::HashMap;

use super::ParsingError;

/// One data row, keyed by trimmed header text. No type coercion happens here.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    /// 1-based line in the sheet (the header is line 1)
    pub line: u64,
    cells: HashMap<String, String>,
}

impl Row {
    #[cfg(test)]
    pub fn from_pairs(line: u64, pairs: &[(&str, &str)]) -> Self {
        Self {
            line,
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// The trimmed cell under `column`, or `None` if missing or blank.
    pub fn cell(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The first non-blank cell among `columns`.
    pub fn first_cell(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|c| self.cell(c))
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.cell(column).map(str::to_string)
    }

    pub fn first_text(&self, columns: &[&str]) -> Option<String> {
        self.first_cell(columns).map(str::to_string)
    }
}

/// Splits CSV text into rows using the first line as headers.
///
/// Blank lines are skipped. Rows with a different field count than the
/// header are a structural error, as is a sheet with no data rows.
pub(crate) fn read_rows(csv_text: &str) -> Result<Vec<Row>, ParsingError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let cells = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(Row { line, cells });
    }

    if rows.is_empty() {
        return Err(ParsingError::Empty);
    }

    Ok(rows)
}

/// Parses a decimal cell. Thousands separators are ignored; anything else
/// unparseable becomes `None`.
pub(crate) fn parse_decimal(raw: Option<&str>) -> Option<f64> {
    let cleaned: String = raw?.chars().filter(|c| *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parses a whole-number cell. A decimal value is truncated.
pub(crate) fn parse_integer(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| parse_decimal(Some(raw)).map(|value| value.trunc() as i64))
}

/// Parses a non-negative count.
pub(crate) fn parse_count(raw: Option<&str>) -> Option<u32> {
    parse_integer(raw).and_then(|value| u32::try_from(value).ok())
}

/// Spreadsheet-style truthy values: `true`, `1`, `yes` or `是`.
pub(crate) fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|v| v.trim().to_lowercase())
        .map(|v| matches!(v.as_str(), "true" | "1" | "yes" | "是"))
        .unwrap_or(false)
}
