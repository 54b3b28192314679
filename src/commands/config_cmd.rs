use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;

use crate::config::{Config, ConfigValue};

#[derive(Clone, ValueEnum, Default)]
pub enum ConfigFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: ConfigFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# tripsheet configuration

# Spreadsheet id (the long id in the sheet's URL)
# sheet_id: your-sheet-id

# Remote write endpoint for shopping list changes
# write_url: http://localhost:8787/write

# Name recorded on items you add or change
user: user

# Local cache directory (default: platform data dir)
# data_dir: ~/.local/share/tripsheet

# Sheet tab ids
tabs:
  itinerary: "0"
  travel_info: "2053866883"
  auth: "2"
  # shopping: "123456"
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    ConfigFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    ConfigFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        print_optional("sheet_id", &config.sheet_id);
                        println!("export_base_url: {}", config.export_base_url.value);
                        println!("  source: {}", config.export_base_url.source);
                        print_optional("write_url", &config.write_url);
                        println!("user: {}", config.user.value);
                        println!("  source: {}", config.user.source);
                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("tabs:");
                        println!("  itinerary: {}", config.tabs.itinerary);
                        println!("  travel_info: {}", config.tabs.travel_info);
                        println!("  auth: {}", config.tabs.auth);
                        println!(
                            "  shopping: {}",
                            config.tabs.shopping.as_deref().unwrap_or("(not set)")
                        );
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'tripsheet config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to set your sheet id and write endpoint.");
                Ok(())
            }
        }
    }
}

fn print_optional(key: &str, value: &ConfigValue<Option<String>>) {
    println!("{}: {}", key, value.value.as_deref().unwrap_or("(not set)"));
    println!("  source: {}", value.source);
}
