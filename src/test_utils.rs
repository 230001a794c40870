//! Test utilities for Finbot
//!
//! Scripted provider and in-memory ledger doubles shared by unit tests,
//! plus helpers for temporary conversation stores.

use crate::error::{FinbotError, Result};
use crate::ledger::{ExpenseLedger, ExpenseRecord};
use crate::memory::{ConversationStore, SharedStore, Turn};
use crate::providers::{CompletionResponse, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Empty shared store backed by `memories.json` inside `dir`
pub fn temp_store(dir: &TempDir) -> Arc<SharedStore> {
    let store = ConversationStore::load(dir.path().join("memories.json"))
        .expect("Failed to load temporary store");
    Arc::new(SharedStore::new(store))
}

/// Provider that answers from a queue of canned replies
///
/// Each `complete` call pops the next reply; an `Err` entry becomes a
/// provider error. Every call is recorded for later assertions.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    media_text: Mutex<Option<String>>,
    /// Turns passed to each `complete` call
    pub completions: Mutex<Vec<Vec<Turn>>>,
    /// System prompts passed to each `complete` call
    pub systems: Mutex<Vec<String>>,
    /// Number of transcription or OCR calls
    pub media_calls: Mutex<usize>,
}

impl ScriptedProvider {
    /// Provider that returns `replies` in order
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// Queue a provider failure
    pub fn then_fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Text returned by transcription and OCR
    pub fn with_media_text(self, text: &str) -> Self {
        *self.media_text.lock().unwrap() = Some(text.to_string());
        self
    }

    /// Number of `complete` calls so far
    pub fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    fn media(&self) -> Result<String> {
        *self.media_calls.lock().unwrap() += 1;
        self.media_text
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FinbotError::Provider("no media text scripted".to_string()).into())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, system: &str, turns: &[Turn]) -> Result<CompletionResponse> {
        self.systems.lock().unwrap().push(system.to_string());
        self.completions.lock().unwrap().push(turns.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(CompletionResponse::new(text)),
            Some(Err(message)) => Err(FinbotError::Provider(message).into()),
            None => Err(FinbotError::Provider("script exhausted".to_string()).into()),
        }
    }

    async fn transcribe_audio(&self, _audio: &[u8], _mime_type: &str) -> Result<String> {
        self.media()
    }

    async fn extract_image_text(&self, _image: &[u8], _mime_type: &str) -> Result<String> {
        self.media()
    }
}

/// Ledger that keeps rows in memory, or fails every insert
#[derive(Default)]
pub struct RecordingLedger {
    /// Rows written so far
    pub rows: Mutex<Vec<ExpenseRecord>>,
    failure: Option<String>,
}

impl RecordingLedger {
    /// Ledger that accepts every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger whose inserts fail with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    /// Number of rows written
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ExpenseLedger for RecordingLedger {
    async fn insert(&self, record: &ExpenseRecord) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(FinbotError::Storage(message.clone()).into());
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}
