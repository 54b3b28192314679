mod auth;
mod config_cmd;
mod info;
mod itinerary;
mod shopping;

use clap::ValueEnum;
use tripsheet_core::{LoadError, LoadOutcome};

pub use auth::{LoginCommand, LogoutCommand, StatusCommand};
pub use config_cmd::ConfigCommand;
pub use info::InfoCommand;
pub use itinerary::ItineraryCommand;
pub use shopping::ShoppingCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Tells the user when a load fell back to cached data.
fn report_load(what: &str, result: Result<LoadOutcome, LoadError>) -> Result<(), LoadError> {
    match result? {
        LoadOutcome::Fresh { count } => {
            tracing::debug!("Loaded {} {}", count, what);
        }
        LoadOutcome::Cached { error, .. } => {
            eprintln!("Warning: could not refresh {} ({}), showing cached data", what, error);
        }
    }
    Ok(())
}

fn check_mark(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}
