//! Finbot - expense-recording chat agent library
//!
//! This library provides the core functionality for Finbot, a webhook chat
//! agent that turns text, voice notes and receipt photos into rows of a
//! personal finance ledger.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Extraction pipeline and model reply protocol
//! - `media`: Media classification, base64 decoding and text extraction
//! - `memory`: Per-sender conversation transcripts and their JSON store
//! - `providers`: Model provider abstraction and the Gemini implementation
//! - `ledger`: Expense records and the PostgreSQL ledger
//! - `prompts`: System prompt for expense extraction
//! - `server`: Axum webhook endpoint
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use finbot::cli::Cli;
//! use finbot::Config;
//! use clap::Parser;
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_from(["finbot", "serve"]);
//!     let config = Config::load("config.yaml", &cli)?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod media;
pub mod memory;
pub mod prompts;
pub mod providers;
pub mod server;

// Re-export commonly used types
pub use agent::{AgentReply, FinanceAgent, InboundMessage};
pub use config::Config;
pub use error::{FinbotError, Result};

#[cfg(test)]
pub mod test_utils;
