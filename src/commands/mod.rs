/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `serve`: Run the webhook server
- `history`: Inspect stored conversation transcripts
*/

use crate::agent::FinanceAgent;
use crate::config::Config;
use crate::error::Result;
use crate::ledger::PostgresLedger;
use crate::memory::{ConversationStore, SharedStore};
use crate::providers::create_provider;
use std::sync::Arc;

// Transcript inspection
pub mod history;

pub mod serve {
    //! Webhook server handler.
    //!
    //! Loads the conversation store, builds the provider and ledger, wires
    //! them into a `FinanceAgent` and serves HTTP until interrupted.

    use super::*;

    /// Build the agent described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing, the store cannot be read or
    /// the ledger settings are invalid
    pub fn build_agent(config: &Config) -> Result<FinanceAgent> {
        let store = ConversationStore::load(&config.memory.path)?;
        let provider = create_provider(config)?;
        let ledger = PostgresLedger::new(&config.database)?;

        Ok(FinanceAgent::new(
            provider,
            Arc::new(ledger),
            Arc::new(SharedStore::new(store)),
            config.ledger.currency_symbol.clone(),
        ))
    }

    /// Start the webhook server
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    pub async fn run_serve(config: Config) -> Result<()> {
        tracing::info!(
            model = %config.model.model,
            memory = %config.memory.path.display(),
            "Starting webhook server"
        );

        let agent = Arc::new(build_agent(&config)?);
        crate::server::serve(agent, &config.server).await
    }

}
