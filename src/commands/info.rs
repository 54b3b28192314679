//! Travel info and packing checklist commands.

use clap::{Args, Subcommand};
use tripsheet_core::InfoItem;

use super::{check_mark, report_load, OutputFormat};
use crate::session::Session;

#[derive(Args)]
pub struct InfoCommand {
    #[command(subcommand)]
    pub command: InfoSubcommand,

    /// Use the cached info without fetching the sheet
    #[arg(long, global = true)]
    cached: bool,
}

#[derive(Subcommand)]
pub enum InfoSubcommand {
    /// List info items, grouped by category
    List {
        /// Only this category
        #[arg(long, short)]
        category: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the categories
    Categories,

    /// Show the packing checklist
    Packing,

    /// Toggle an item's packed mark
    Pack {
        /// Item ID
        id: String,
    },

    /// Clear every packed mark
    Unpack,
}

impl InfoCommand {
    pub async fn run(&self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        let mut store = session.travel_info();
        if !self.cached {
            report_load("travel info", store.load_from_source().await)?;
        }

        match &self.command {
            InfoSubcommand::List { category, format } => {
                store.filter_by_category(category.as_deref());
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&store.filtered_items())?);
                    }
                    OutputFormat::Table => {
                        let grouped = store.items_by_category();
                        if grouped.is_empty() {
                            println!("No travel info.");
                        }
                        for (name, items) in grouped {
                            if category.as_ref().is_some_and(|c| c != &name) {
                                continue;
                            }
                            println!("{}", name);
                            println!("{}", "-".repeat(44));
                            for item in items {
                                print_item(item);
                            }
                            println!();
                        }
                    }
                }
            }

            InfoSubcommand::Categories => {
                for category in store.categories() {
                    println!("{}", category);
                }
            }

            InfoSubcommand::Packing => {
                let list = store.packing_list();
                if list.is_empty() {
                    println!("No packing list.");
                    return Ok(());
                }
                for item in list {
                    println!("{} {}  ({})", check_mark(item.is_packed), item.title, item.id);
                }
                println!("\nPacked: {}%", store.packing_progress());
            }

            InfoSubcommand::Pack { id } => match store.toggle_packed(id) {
                Some(true) => println!("Packed {}", id),
                Some(false) => println!("Unpacked {}", id),
                None => return Err(format!("Info item not found: {}", id).into()),
            },

            InfoSubcommand::Unpack => {
                store.clear_packing_state();
                println!("Cleared all packed marks");
            }
        }

        Ok(())
    }
}

fn print_item(item: &InfoItem) {
    match item.amount {
        Some(amount) => println!("  {} x{}", item.title, amount),
        None => println!("  {}", item.title),
    }
    if let Some(content) = &item.content {
        println!("    {}", content);
    }
    if let Some(name) = &item.contact_name {
        let phone = item.phone.as_deref().unwrap_or("");
        println!("    {} {}", name, phone);
    }
    if let Some(address) = &item.address {
        println!("    {}", address);
    }
    for link in &item.link_list {
        println!("    {}", link);
    }
}
