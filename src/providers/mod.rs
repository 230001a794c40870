//! Provider module for Finbot
//!
//! This module contains the model provider abstraction and the Gemini
//! implementation used for chat, transcription and OCR.

pub mod base;
pub mod gemini;

pub use base::{CompletionResponse, Provider, TokenUsage};
pub use gemini::GeminiProvider;

use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;

/// Create the configured provider
///
/// # Errors
///
/// Returns error if no API key is configured or the client cannot be built
pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let api_key = config.require_api_key()?;
    Ok(Arc::new(GeminiProvider::new(&config.model, api_key)?))
}
