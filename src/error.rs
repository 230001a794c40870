//! Error types for Finbot
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Finbot operations
///
/// Covers every failure a webhook request can run into: payload decoding,
/// media extraction, model calls, reply parsing and ledger writes, plus the
/// configuration and I/O errors of the surrounding process.
#[derive(Error, Debug)]
pub enum FinbotError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inbound request is missing required data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Binary content was not valid base64
    #[error("Decode error: {0}")]
    Decode(String),

    /// Transcription or OCR produced no usable text
    #[error("Extraction produced no text: {0}")]
    EmptyExtraction(String),

    /// Media kind tag not recognized
    #[error("Unsupported media kind: {0}")]
    UnsupportedMedia(String),

    /// Model provider errors (network, quota, malformed responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Completion reply carried the sentinel but its body was malformed
    #[error("Reply parse error: {0}")]
    ReplyParse(String),

    /// Expense ledger write failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Conversation store load/save failures
    #[error("Memory store error: {0}")]
    Memory(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for Finbot operations
///
/// Uses `anyhow::Error` so callers can attach context while the concrete
/// `FinbotError` stays recoverable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
