use thiserror::Error;

use super::RecordType;

/// Errors that abort a whole CSV batch.
///
/// A single bad row never produces one of these; it is skipped with a
/// warning instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParsingError {
    #[error(
        "CSV parse error{}: {message}",
        .line.map(|l| format!(" at line {}", l)).unwrap_or_default()
    )]
    Malformed { line: Option<u64>, message: String },

    #[error("CSV data is empty")]
    Empty,

    #[error("No usable {0} rows in CSV data")]
    NoUsableRows(RecordType),

    #[error("Auth config contains no passwords")]
    NoCredentials,

    #[error("All passwords have expired")]
    AllCredentialsExpired,
}

impl From<csv::Error> for ParsingError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line());
        let message = match e.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => format!("expected {} fields, found {}", expected_len, len),
            csv::ErrorKind::Utf8 { .. } => "data is not valid UTF-8".to_string(),
            _ => e.to_string(),
        };
        ParsingError::Malformed { line, message }
    }
}
