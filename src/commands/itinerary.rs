//! Itinerary CLI commands.

use clap::{Args, Subcommand};
use tripsheet_core::dates::{format_date, parse_date};
use tripsheet_core::ItineraryStore;

use super::{check_mark, report_load, OutputFormat};
use crate::session::Session;

#[derive(Args)]
pub struct ItineraryCommand {
    #[command(subcommand)]
    pub command: ItinerarySubcommand,

    /// Use the cached itinerary without fetching the sheet
    #[arg(long, global = true)]
    cached: bool,
}

#[derive(Subcommand)]
pub enum ItinerarySubcommand {
    /// Show one day of the itinerary
    Show {
        /// Day to show (YYYY-MM-DD), defaults to the first day
        #[arg(long, short)]
        date: Option<String>,

        /// Only items matching this text
        #[arg(long, short)]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the days in the itinerary
    Dates,

    /// Show how often each tag is used
    Tags,

    /// Mark an item as done
    Done {
        /// Item ID
        id: String,
    },

    /// Mark an item as not done
    Undo {
        /// Item ID
        id: String,
    },

    /// Clear every done mark
    Reset,
}

impl ItineraryCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let mut store = session.itinerary();
        if !self.cached {
            report_load("itinerary", store.load_from_source().await)?;
        }

        match &self.command {
            ItinerarySubcommand::Show {
                date,
                search,
                format,
            } => {
                if let Some(date) = date {
                    let date = parse_date(date)?;
                    if !store.switch_date(date) {
                        return Err(format!("No itinerary for {}", format_date(date)).into());
                    }
                }
                if let Some(query) = search {
                    store.set_search_query(query.clone());
                }

                match format {
                    OutputFormat::Json => {
                        let items = store.filtered_items();
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Table => print_day(&store),
                }
            }

            ItinerarySubcommand::Dates => {
                let current = store.current_date();
                for day in store.days() {
                    let marker = if Some(day.date) == current { "*" } else { " " };
                    println!(
                        "{} {}  {} items, {}/{} done",
                        marker,
                        format_date(day.date),
                        day.items.len(),
                        day.completed_count,
                        day.items.len()
                    );
                }
            }

            ItinerarySubcommand::Tags => {
                let stats = store.tag_statistics();
                if stats.is_empty() {
                    println!("No tags.");
                }
                for (tag, count) in stats {
                    println!("{:<20} {}", tag, count);
                }
            }

            ItinerarySubcommand::Done { id } => {
                store.toggle_complete(id, true);
                println!("Marked {} as done", id);
            }

            ItinerarySubcommand::Undo { id } => {
                store.toggle_complete(id, false);
                println!("Marked {} as not done", id);
            }

            ItinerarySubcommand::Reset => {
                store.clear_completion_state();
                println!("Cleared all done marks");
            }
        }

        Ok(())
    }
}

fn print_day(store: &ItineraryStore) {
    let Some(day) = store.current_day() else {
        println!("No itinerary loaded.");
        return;
    };

    println!("{}", format_date(day.date));
    println!("{}", "=".repeat(44));

    let items = store.filtered_items();
    if items.is_empty() {
        println!("No matching items.");
    }
    for item in items {
        let time = item.time.as_deref().unwrap_or("--:--");
        println!("{} {} {}", check_mark(item.is_completed), time, item.title);
        if let Some(location) = &item.location {
            println!("      @ {}", location);
        }
        if !item.tag_list.is_empty() {
            println!("      #{}", item.tag_list.join(" #"));
        }
        println!("      id: {}", item.id);
    }

    println!("{}", "-".repeat(44));
    println!(
        "Cost: {:.0}  Done: {}%",
        store.total_cost(),
        store.completion_percentage()
    );
    if let Some(notes) = &day.notes {
        println!("Notes: {}", notes);
    }
}
