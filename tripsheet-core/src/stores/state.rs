use std::fmt;

use thiserror::Error;

use crate::cache::CacheError;
use crate::ingest::{ParsingError, RecordType, SheetError};

/// Lifecycle of a store's data.
///
/// `Error` can go back to `Loading` on the next attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Error(String),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unloaded => write!(f, "unloaded"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Ready => write!(f, "ready"),
            LoadState::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Where a load ended up getting its data.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Fresh data from the sheet
    Fresh { count: usize },
    /// The sheet load failed; the last cached copy is shown instead
    Cached { count: usize, error: String },
}

impl LoadOutcome {
    pub fn count(&self) -> usize {
        match self {
            LoadOutcome::Fresh { count } | LoadOutcome::Cached { count, .. } => *count,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, LoadOutcome::Fresh { .. })
    }
}

/// A load failed and there was nothing cached to fall back to.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No sheet tab configured for {0}")]
    NotConfigured(RecordType),

    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Parse(#[from] ParsingError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
