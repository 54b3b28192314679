//! Credentials loaded from the auth sheet and the persisted login state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::parse_date;

/// Version tag written into [`AuthConfig`] and [`AuthState`].
pub const AUTH_DATA_VERSION: &str = "1.0.0";

/// A single shared password row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthItem {
    /// Plaintext password or its SHA-256 hex digest
    pub password: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD`; absent means the password never expires
    pub expiry_date: Option<String>,
    pub is_senior_mode: bool,
    #[serde(skip_deserializing, default)]
    pub is_valid: bool,
}

impl AuthItem {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            description: None,
            expiry_date: None,
            is_senior_mode: false,
            is_valid: true,
        }
    }

    pub fn refresh_derived(&mut self, today: NaiveDate) {
        self.is_valid = compute_is_valid(self, today);
    }
}

/// Whether a credential is still usable on `today`.
///
/// Expiry is compared by calendar day only, so a password expiring today is
/// still valid. An expiry that is not a real date counts as expired.
pub fn compute_is_valid(item: &AuthItem, today: NaiveDate) -> bool {
    match item.expiry_date.as_deref() {
        None => true,
        Some(raw) => parse_date(raw).map(|expiry| expiry >= today).unwrap_or(false),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub items: Vec<AuthItem>,
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

impl AuthConfig {
    pub fn new(items: Vec<AuthItem>, last_updated: DateTime<Utc>) -> Self {
        Self {
            items,
            last_updated,
            version: AUTH_DATA_VERSION.to_string(),
        }
    }

    pub fn valid_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_valid).count()
    }
}

/// Login state kept in the local cache between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    /// Unix timestamp in milliseconds
    pub auth_timestamp: i64,
    pub version: String,
}
