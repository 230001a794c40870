//! Agent module for Finbot
//!
//! This module contains the expense extraction pipeline and the protocol
//! used to read completed records out of model replies.

pub mod core;
pub mod reply;

pub use core::{AgentReply, FinanceAgent, InboundMessage};
pub use reply::{ExtractionReply, SENTINEL};
