//! Command-line interface definition for Finbot
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the webhook server and inspect stored
//! conversations.

use clap::{Parser, Subcommand};

/// Finbot - expense-recording chat agent
///
/// Receives text, voice and photographed expense reports over a webhook and
/// records them in a finance ledger.
#[derive(Parser, Debug, Clone)]
#[command(name = "finbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Finbot
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the webhook server
    Serve {
        /// Override the listening port from config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect stored conversation transcripts
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List senders with stored transcripts
    List,

    /// Print one sender's transcript
    Show {
        /// Sender identifier
        sender: String,

        /// Print the raw JSON turns instead of a formatted view
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
