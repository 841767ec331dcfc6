//! Command line interface.
//!
//! This module contains the CLI parser and dispatches to command modules.

mod progress;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::load_settings;
use crate::models::{BASE_COLUMN_COUNT, COLUMNS};

pub use scrape::ScrapeArgs;

#[derive(Parser)]
#[command(name = "tubesift")]
#[command(about = "Rank a YouTube channel's uploads by views and collect transcripts")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a channel, keep videos above the view threshold and write a CSV
    Scrape(ScrapeArgs),

    /// List the output columns in order
    Columns,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape(args) => {
            let (settings, _config) = load_settings(cli.config.as_deref())
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            scrape::cmd_scrape(settings, &args).await
        }
        Commands::Columns => {
            cmd_columns();
            Ok(())
        }
    }
}

fn cmd_columns() {
    for (idx, name) in COLUMNS.iter().enumerate() {
        if idx < BASE_COLUMN_COUNT {
            println!("{:>2}  {}", idx + 1, name);
        } else {
            println!("{:>2}  {} {}", idx + 1, name, style("(extended)").dim());
        }
    }
}
