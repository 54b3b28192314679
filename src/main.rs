use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod session;

use commands::{
    ConfigCommand, InfoCommand, ItineraryCommand, LoginCommand, LogoutCommand, ShoppingCommand,
    StatusCommand,
};
use config::Config;
use session::Session;

#[derive(Parser)]
#[command(name = "tripsheet")]
#[command(version)]
#[command(about = "Offline trip itinerary and shopping lists backed by a spreadsheet", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Work from the local cache and queue every write
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the itinerary
    Itinerary(ItineraryCommand),

    /// Travel info and the packing checklist
    Info(InfoCommand),

    /// Manage shopping lists
    Shopping(ShoppingCommand),

    /// Log in with a shared password
    Login(LoginCommand),

    /// Forget the current login
    Logout(LogoutCommand),

    /// Show login and sync queue status
    Status(StatusCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripsheet=warn,tripsheet_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let session = Session::open(&config, cli.offline);
    let rt = tokio::runtime::Runtime::new()?;

    match command {
        Commands::Itinerary(cmd) => rt.block_on(cmd.run(&session))?,
        Commands::Info(cmd) => rt.block_on(cmd.run(&session))?,
        Commands::Shopping(cmd) => rt.block_on(cmd.run(&session, &config))?,
        Commands::Login(cmd) => rt.block_on(cmd.run(&session))?,
        Commands::Logout(cmd) => cmd.run(&session)?,
        Commands::Status(cmd) => cmd.run(&session, &config)?,
        Commands::Config(_) => {}
    }

    Ok(())
}
