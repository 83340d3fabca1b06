//! Sui swap bot - aggregator-routed swaps under repeatable strategies
//!
//! # WARNING
//! - This bot signs and executes real transactions with the configured key.
//! - Loop strategies spend gas on every iteration, successful or not.
//! - Disposable wallets are funded from the main wallet and then abandoned.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use sui_swap_bot::cli::commands;
use sui_swap_bot::config::Config;

/// Sui aggregator swap bot
#[derive(Parser)]
#[command(name = "swapbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Swap the configured pair once
    Swap {
        /// Keep swapping until interrupted
        #[arg(long)]
        forever: bool,
    },

    /// Sell every non-base asset into the base asset
    Sweep {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Buy the target and sell the whole position back
    RoundTrip {
        /// Number of round trips (default: until interrupted)
        #[arg(long)]
        iterations: Option<u64>,
    },

    /// Run the configured number of buy/sell rounds
    Volume {
        /// Repeat the rounds until interrupted
        #[arg(long)]
        forever: bool,
    },

    /// One swap per freshly funded disposable wallet
    Relay {
        /// Number of wallets to use (default: until interrupted)
        #[arg(long)]
        iterations: Option<u64>,
    },

    /// Show main wallet balances
    Balances,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sui_swap_bot=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Swap { forever } => commands::swap(&config, forever).await,
        Commands::Sweep { force } => commands::sweep(&config, force).await,
        Commands::RoundTrip { iterations } => commands::round_trip(&config, iterations).await,
        Commands::Volume { forever } => commands::volume(&config, forever).await,
        Commands::Relay { iterations } => commands::relay(&config, iterations).await,
        Commands::Balances => commands::balances(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
