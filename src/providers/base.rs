//! Base provider trait and common types
//!
//! This module defines the Provider trait that all model backends implement,
//! along with the response and usage types shared between them.

use crate::error::Result;
use crate::memory::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage information from a completion
///
/// Tracks the number of tokens used in prompts and completions,
/// as reported by the model provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Completion response with reply text and optional token usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// The model's reply
    pub text: String,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a response without usage data
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::providers::CompletionResponse;
    ///
    /// let response = CompletionResponse::new("¿Cuánto gastaste?");
    /// assert!(response.usage.is_none());
    /// ```
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Create a response with token usage
    pub fn with_usage(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage: Some(usage),
        }
    }
}

/// Provider trait for model backends
///
/// A provider answers a conversation given a system instruction, and turns
/// audio or images into plain text.
///
/// # Examples
///
/// ```no_run
/// use finbot::providers::{CompletionResponse, Provider};
/// use finbot::memory::Turn;
/// use finbot::error::Result;
/// use async_trait::async_trait;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl Provider for MyProvider {
///     async fn complete(&self, _system: &str, _turns: &[Turn]) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::new("Response"))
///     }
///
///     async fn transcribe_audio(&self, _audio: &[u8], _mime_type: &str) -> Result<String> {
///         Ok("transcript".to_string())
///     }
///
///     async fn extract_image_text(&self, _image: &[u8], _mime_type: &str) -> Result<String> {
///         Ok("receipt text".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation
    ///
    /// # Arguments
    ///
    /// * `system` - System instruction applied to the whole exchange
    /// * `turns` - Conversation history, oldest first, ending with the newest human turn
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or the response carries no text
    async fn complete(&self, system: &str, turns: &[Turn]) -> Result<CompletionResponse>;

    /// Transcribes an audio clip to text
    async fn transcribe_audio(&self, audio: &[u8], mime_type: &str) -> Result<String>;

    /// Extracts the visible text from an image
    async fn extract_image_text(&self, image: &[u8], mime_type: &str) -> Result<String>;

    /// Model identifier, for logs
    fn model_name(&self) -> &str {
        "unknown"
    }
}
