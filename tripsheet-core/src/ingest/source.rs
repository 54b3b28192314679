//! Fetching CSV exports from the spreadsheet service.

use async_trait::async_trait;
use thiserror::Error;

/// Public spreadsheet export endpoint.
pub const DEFAULT_EXPORT_BASE_URL: &str = "https://docs.google.com/spreadsheets";

/// Errors fetching a sheet export.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetError {
    #[error("Network error fetching sheet: {0}")]
    Network(String),

    #[error("Sheet export returned status {0}")]
    Status(u16),

    #[error("Sheet export is empty")]
    Empty,
}

/// Somewhere CSV exports can be fetched from, addressed by tab id.
#[async_trait]
pub trait CsvSource: Send + Sync {
    async fn fetch(&self, gid: &str) -> Result<String, SheetError>;
}

/// Fetches `<base>/d/<sheet_id>/export?format=csv&gid=<gid>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCsvSource {
    client: reqwest::Client,
    base_url: String,
    sheet_id: String,
}

impl HttpCsvSource {
    pub fn new(sheet_id: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_EXPORT_BASE_URL, sheet_id)
    }

    pub fn with_base_url(base_url: impl Into<String>, sheet_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sheet_id: sheet_id.into(),
        }
    }

    pub fn export_url(&self, gid: &str) -> String {
        format!(
            "{}/d/{}/export?format=csv&gid={}",
            self.base_url, self.sheet_id, gid
        )
    }
}

#[async_trait]
impl CsvSource for HttpCsvSource {
    async fn fetch(&self, gid: &str) -> Result<String, SheetError> {
        let url = self.export_url(gid);
        tracing::debug!("Fetching sheet export {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SheetError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SheetError::Network(e.to_string()))?;

        if body.trim().is_empty() {
            return Err(SheetError::Empty);
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;

    async fn export(
        Path(sheet_id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        match (sheet_id.as_str(), params.get("gid").map(String::as_str)) {
            ("sheet-1", Some("0")) => (StatusCode::OK, "日期,標題\n2025-01-15,A\n".to_string()),
            ("sheet-1", Some("9")) => (StatusCode::OK, "  \n".to_string()),
            _ => (StatusCode::NOT_FOUND, String::new()),
        }
    }

    async fn serve() -> String {
        let app = Router::new().route("/spreadsheets/d/{sheet_id}/export", get(export));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/spreadsheets", addr)
    }

    #[test]
    fn test_export_url() {
        let source = HttpCsvSource::with_base_url("http://localhost/spreadsheets/", "abc");
        assert_eq!(
            source.export_url("123"),
            "http://localhost/spreadsheets/d/abc/export?format=csv&gid=123"
        );
    }

    #[tokio::test]
    async fn test_fetch_outcomes() {
        let base = serve().await;
        let source = HttpCsvSource::with_base_url(&base, "sheet-1");

        let body = source.fetch("0").await.unwrap();
        assert!(body.starts_with("日期,標題"));

        assert_eq!(source.fetch("9").await.unwrap_err(), SheetError::Empty);
        assert_eq!(source.fetch("5").await.unwrap_err(), SheetError::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let source = HttpCsvSource::with_base_url("http://127.0.0.1:1", "sheet-1");
        assert!(matches!(
            source.fetch("0").await.unwrap_err(),
            SheetError::Network(_)
        ));
    }
}
