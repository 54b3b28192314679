//! Shared-password login with a persisted, time-limited session.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::state::{LoadError, LoadOutcome, LoadState};
use super::{fetch_records, StoreContext};
use crate::cache::{keys, load_json, save_json, LocalCache};
use crate::ingest;
use crate::models::{AuthConfig, AuthItem, AuthState, AUTH_DATA_VERSION};

/// How long a login stays valid.
pub const AUTH_TTL: Duration = Duration::days(7);

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid password")]
    InvalidPassword,

    #[error(transparent)]
    Load(#[from] LoadError),
}

pub struct AuthStore {
    ctx: StoreContext,
    sheet_gid: String,
    config: Option<AuthConfig>,
    session: Option<AuthState>,
    state: LoadState,
}

impl AuthStore {
    pub fn new(ctx: StoreContext, sheet_gid: impl Into<String>) -> Self {
        let mut store = Self {
            ctx,
            sheet_gid: sheet_gid.into(),
            config: None,
            session: None,
            state: LoadState::Unloaded,
        };
        store.config = store.read_mirror();
        store.restore_auth_state();
        store
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn config(&self) -> Option<&AuthConfig> {
        self.config.as_ref()
    }

    /// Loads the credential sheet. Fails when the sheet has no credentials
    /// or all of them have expired, unless a cached copy exists.
    pub async fn load_auth_config(&mut self) -> Result<LoadOutcome, LoadError> {
        self.state = LoadState::Loading;
        let clock = self.ctx.clock.clone();

        let result = fetch_records(self.ctx.source.as_ref(), &self.sheet_gid, |csv| {
            ingest::parse_auth_config(csv, clock.as_ref())
        })
        .await;

        match result {
            Ok(config) => {
                let count = config.items.len();
                if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::AUTH_CONFIG, &config) {
                    tracing::warn!("Failed to cache auth config: {}", e);
                }
                tracing::info!(
                    "Loaded {} credentials ({} valid)",
                    count,
                    config.valid_count()
                );
                self.config = Some(config);
                self.state = LoadState::Ready;
                Ok(LoadOutcome::Fresh { count })
            }
            Err(e) => {
                self.state = LoadState::Error(e.to_string());
                match self.read_mirror() {
                    Some(config) => {
                        tracing::warn!("Auth config load failed, using cached copy: {}", e);
                        let count = config.items.len();
                        self.config = Some(config);
                        Ok(LoadOutcome::Cached {
                            count,
                            error: e.to_string(),
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }

    pub fn valid_passwords(&self) -> Vec<&AuthItem> {
        self.config
            .iter()
            .flat_map(|config| config.items.iter())
            .filter(|item| item.is_valid)
            .collect()
    }

    /// Checks a candidate against every valid credential. Stored passwords
    /// may be plaintext or a SHA-256 hex digest.
    pub fn validate_password(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        let digest = format!("{:x}", Sha256::digest(candidate.as_bytes()));
        self.valid_passwords().iter().any(|item| {
            item.password == candidate || item.password.eq_ignore_ascii_case(&digest)
        })
    }

    pub fn login(&mut self, password: &str) -> Result<(), AuthError> {
        if !self.validate_password(password) {
            tracing::info!("Login rejected");
            return Err(AuthError::InvalidPassword);
        }

        let session = AuthState {
            is_authenticated: true,
            auth_timestamp: self.ctx.clock.now().timestamp_millis(),
            version: AUTH_DATA_VERSION.to_string(),
        };
        if let Err(e) = save_json(self.ctx.cache.as_ref(), keys::AUTH_STATE, &session) {
            tracing::warn!("Failed to persist login: {}", e);
        }
        self.session = Some(session);
        tracing::info!("Logged in");
        Ok(())
    }

    pub fn logout(&mut self) {
        self.session = None;
        self.clear_stored_session();
    }

    /// Restores a persisted login. A session from another data version or
    /// older than [`AUTH_TTL`] is discarded along with its stored copy.
    pub fn restore_auth_state(&mut self) {
        self.session = None;
        let stored = match load_json::<AuthState>(self.ctx.cache.as_ref(), keys::AUTH_STATE) {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Stored login unreadable, clearing: {}", e);
                self.clear_stored_session();
                return;
            }
        };

        if stored.version != AUTH_DATA_VERSION {
            tracing::warn!("Stored login has version {}, clearing", stored.version);
            self.clear_stored_session();
            return;
        }
        if self.elapsed_since(&stored) > AUTH_TTL {
            tracing::info!("Stored login expired");
            self.clear_stored_session();
            return;
        }
        if stored.is_authenticated {
            self.session = Some(stored);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .map(|session| session.is_authenticated)
            .unwrap_or(false)
    }

    /// Authenticated and still inside the TTL.
    pub fn is_login_valid(&self) -> bool {
        match &self.session {
            Some(session) if session.is_authenticated => self.elapsed_since(session) <= AUTH_TTL,
            _ => false,
        }
    }

    /// Time until the login expires, zero when there is none.
    pub fn remaining_time(&self) -> Duration {
        match &self.session {
            Some(session) if session.is_authenticated => {
                (AUTH_TTL - self.elapsed_since(session)).max(Duration::zero())
            }
            _ => Duration::zero(),
        }
    }

    pub fn logged_in_at(&self) -> Option<DateTime<Utc>> {
        self.session
            .as_ref()
            .and_then(|session| DateTime::from_timestamp_millis(session.auth_timestamp))
    }

    fn elapsed_since(&self, session: &AuthState) -> Duration {
        Duration::milliseconds(self.ctx.clock.now().timestamp_millis() - session.auth_timestamp)
    }

    fn clear_stored_session(&self) {
        if let Err(e) = self.ctx.cache.remove(keys::AUTH_STATE) {
            tracing::warn!("Failed to clear stored login: {}", e);
        }
    }

    fn read_mirror(&self) -> Option<AuthConfig> {
        match load_json::<AuthConfig>(self.ctx.cache.as_ref(), keys::AUTH_CONFIG) {
            Ok(config) => config.map(|mut config| {
                let today = self.ctx.clock.today();
                for item in &mut config.items {
                    item.refresh_derived(today);
                }
                config
            }),
            Err(e) => {
                tracing::warn!("Cached auth config unreadable: {}", e);
                None
            }
        }
    }
}
