use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rasad", about = "Persian media monitor — watchlist translation, scanning, and analysis")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration file
    Validate,

    /// Run one monitoring pass over the watchlist
    Run {
        /// Only monitor watchlist topics containing this substring
        #[arg(long)]
        topic: Option<String>,

        /// Write per-topic markdown reports into this directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
