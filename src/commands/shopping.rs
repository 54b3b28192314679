//! Shopping list CLI commands.
//!
//! Edits apply locally first and are written to the remote endpoint in the
//! background; anything that cannot be sent is kept in the sync queue.

use std::time::Duration;

use clap::{Args, Subcommand};
use tripsheet_core::network::wait_for_reconnect;
use tripsheet_core::{Connectivity, ShoppingItem, ShoppingItemPatch, ShoppingStore, SyncReport};

use super::{check_mark, report_load, OutputFormat};
use crate::config::{Config, ConfigError};
use crate::session::Session;

#[derive(Args)]
pub struct ShoppingCommand {
    #[command(subcommand)]
    pub command: ShoppingSubcommand,
}

/// Optional item fields shared by `add` and `update`.
#[derive(Args, Debug, Default, Clone)]
pub struct ItemFields {
    /// Quantity
    #[arg(long, short)]
    qty: Option<u32>,

    /// Unit (e.g. "boxes", "bags")
    #[arg(long, short)]
    unit: Option<String>,

    /// Estimated cost
    #[arg(long, short)]
    amount: Option<f64>,

    /// Currency code
    #[arg(long)]
    currency: Option<String>,

    /// Free-form note
    #[arg(long, short)]
    note: Option<String>,
}

impl ItemFields {
    fn into_patch(self, name: Option<String>) -> ShoppingItemPatch {
        ShoppingItemPatch {
            name,
            quantity: self.qty,
            unit: self.unit,
            estimated_amount: self.amount,
            currency: self.currency,
            note: self.note,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
pub enum ShoppingSubcommand {
    /// List shopping items, for one itinerary entry or all of them
    List {
        /// Itinerary item ID
        itinerary_id: Option<String>,

        /// Use the cached lists without fetching the sheet
        #[arg(long)]
        cached: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Add an item to an itinerary entry's list
    Add {
        /// Itinerary item ID
        itinerary_id: String,

        /// Item name
        name: String,

        #[command(flatten)]
        fields: ItemFields,
    },

    /// Change an item
    Update {
        /// Shopping item ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        fields: ItemFields,
    },

    /// Toggle an item's bought mark
    Toggle {
        /// Shopping item ID
        id: String,
    },

    /// Delete an item
    Delete {
        /// Shopping item ID
        id: String,
    },

    /// Forget lists locally (nothing is deleted remotely)
    Clear {
        /// Itinerary item ID; clears every list when omitted
        itinerary_id: Option<String>,
    },

    /// Send queued writes now
    Sync,

    /// Show the sync queue
    Queue,

    /// Keep running and send queued writes whenever the endpoint comes back
    Watch {
        /// Seconds between connectivity checks
        #[arg(long, short, default_value = "15")]
        interval: u64,
    },
}

impl ShoppingCommand {
    pub async fn run(
        &self,
        session: &Session,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut store = session.shopping();

        match &self.command {
            ShoppingSubcommand::List {
                itinerary_id,
                cached,
                format,
            } => {
                if !cached && config.tabs.shopping.is_some() {
                    report_load("shopping lists", store.load_from_source().await)?;
                }

                let items: Vec<ShoppingItem> = match itinerary_id {
                    Some(id) => store.get_shopping_list(id).items().to_vec(),
                    None => store
                        .all_shopping_lists()
                        .flat_map(|list| list.items().iter().cloned())
                        .collect(),
                };

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Table => print_lists(&store, itinerary_id.as_deref()),
                }
            }

            ShoppingSubcommand::Add {
                itinerary_id,
                name,
                fields,
            } => {
                let draft = fields.clone().into_patch(Some(name.clone()));
                let item = store.add_item(itinerary_id, draft)?;
                println!("Added {} ({})", item.name, item.id);
            }

            ShoppingSubcommand::Update { id, name, fields } => {
                let changes = fields.clone().into_patch(name.clone());
                let item = store.update_item(id, changes)?;
                println!("Updated {} ({})", item.name, item.id);
            }

            ShoppingSubcommand::Toggle { id } => {
                let item = store.toggle_item_complete(id)?;
                let state = if item.is_completed { "bought" } else { "not bought" };
                println!("Marked {} as {}", item.name, state);
            }

            ShoppingSubcommand::Delete { id } => {
                let item = store.delete_item(id)?;
                println!("Deleted {} ({})", item.name, item.id);
            }

            ShoppingSubcommand::Clear { itinerary_id } => match itinerary_id {
                Some(id) => {
                    store.clear_list(id);
                    println!("Cleared list for {}", id);
                }
                None => {
                    store.clear_all_lists();
                    println!("Cleared all lists");
                }
            },

            ShoppingSubcommand::Sync => {
                let report = store.sync_pending().await;
                print_report(&report);
            }

            ShoppingSubcommand::Queue => {
                let entries = store.queue().items();
                if entries.is_empty() {
                    println!("Sync queue is empty.");
                }
                for entry in entries {
                    println!(
                        "{:<8} {:<38} retries: {}{}",
                        entry.operation.to_string(),
                        entry.item_id.as_deref().unwrap_or("-"),
                        entry.retry_count,
                        entry
                            .last_error
                            .as_deref()
                            .map(|e| format!("  ({})", e))
                            .unwrap_or_default()
                    );
                }
                if store.dropped_writes() > 0 {
                    println!("\n{} writes dropped after repeated failures", store.dropped_writes());
                }
            }

            ShoppingSubcommand::Watch { interval } => {
                let url = config
                    .write_url
                    .value
                    .clone()
                    .ok_or(ConfigError::Missing("write_url", "TRIPSHEET_WRITE_URL"))?;
                watch(&mut store, session.network().clone(), url, *interval).await;
            }
        }

        store.flush().await;
        Ok(())
    }
}

fn print_lists(store: &ShoppingStore, only: Option<&str>) {
    let lists: Vec<_> = match only {
        Some(id) => vec![store.get_shopping_list(id)],
        None => store.all_shopping_lists().cloned().collect(),
    };
    if lists.iter().all(|list| list.items().is_empty()) {
        println!("No shopping items.");
        return;
    }

    for list in lists {
        println!("{}", list.itinerary_item_id());
        println!("{}", "=".repeat(44));
        for item in list.items() {
            let qty = match (item.quantity, &item.unit) {
                (Some(q), Some(unit)) => format!("{} {}", q, unit),
                (Some(q), None) => q.to_string(),
                _ => String::new(),
            };
            println!(
                "{} {:<25} {:<10} {}",
                check_mark(item.is_completed),
                item.name,
                qty,
                item.id
            );
        }
        println!(
            "{}/{} bought, est. {:.0}\n",
            list.completed_count(),
            list.items().len(),
            list.total_estimated_amount()
        );
    }
    if store.pending_writes() > 0 {
        println!("{} changes waiting to sync", store.pending_writes());
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "Sent {}, failed {}, dropped {}, {} still queued",
        report.sent, report.failed, report.evicted, report.remaining
    );
    if report.reloaded {
        println!("Lists reloaded from the sheet.");
    }
}

/// Drains the queue now and after every reconnect until interrupted.
async fn watch(store: &mut ShoppingStore, network: Connectivity, url: String, interval: u64) {
    let mut reconnects = network.subscribe();
    let prober = tokio::spawn(probe(network, url, Duration::from_secs(interval.max(1))));

    print_report(&store.sync_pending().await);
    println!("Watching for reconnects (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            reconnected = wait_for_reconnect(&mut reconnects) => {
                if !reconnected {
                    break;
                }
                println!("Back online, syncing...");
                print_report(&store.sync_pending().await);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    prober.abort();
}

/// Marks the network online while the write endpoint answers at all.
async fn probe(network: Connectivity, url: String, every: Duration) {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let reachable = client.get(&url).send().await.is_ok();
        if network.is_online() != reachable {
            tracing::info!("Write endpoint {}", if reachable { "reachable" } else { "unreachable" });
        }
        network.set_online(reachable);
    }
}
