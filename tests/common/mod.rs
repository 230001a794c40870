use async_trait::async_trait;
use chrono::NaiveDate;
use finbot::error::{FinbotError, Result};
use finbot::ledger::{ExpenseLedger, ExpenseRecord};
use finbot::memory::{ConversationStore, SharedStore, Turn};
use finbot::providers::{CompletionResponse, Provider};
use finbot::FinanceAgent;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Provider answering `complete` calls from a queue of canned replies
#[allow(dead_code)]
#[derive(Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<String>>,
    media_text: Option<String>,
    delay: Option<Duration>,
    pub complete_calls: AtomicUsize,
    pub media_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn with_media_text(mut self, text: &str) -> Self {
        self.media_text = Some(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn complete_count(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn media_count(&self) -> usize {
        self.media_calls.load(Ordering::SeqCst)
    }

    fn media(&self) -> Result<String> {
        self.media_calls.fetch_add(1, Ordering::SeqCst);
        self.media_text
            .clone()
            .ok_or_else(|| FinbotError::Provider("no media text".to_string()).into())
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, _system: &str, turns: &[Turn]) -> Result<CompletionResponse> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("echo: {}", turns.last().map_or("", |t| t.content.as_str())));
        Ok(CompletionResponse::new(reply))
    }

    async fn transcribe_audio(&self, _audio: &[u8], _mime_type: &str) -> Result<String> {
        self.media()
    }

    async fn extract_image_text(&self, _image: &[u8], _mime_type: &str) -> Result<String> {
        self.media()
    }
}

/// Ledger keeping rows in memory
#[allow(dead_code)]
#[derive(Default)]
pub struct InMemoryLedger {
    pub rows: Mutex<Vec<ExpenseRecord>>,
}

#[allow(dead_code)]
impl InMemoryLedger {
    pub fn rows(&self) -> Vec<ExpenseRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExpenseLedger for InMemoryLedger {
    async fn insert(&self, record: &ExpenseRecord) -> Result<()> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Ledger whose inserts always fail
#[allow(dead_code)]
pub struct FailingLedger;

#[async_trait]
impl ExpenseLedger for FailingLedger {
    async fn insert(&self, _record: &ExpenseRecord) -> Result<()> {
        Err(FinbotError::Storage("Error al registrar gasto: connection refused".to_string()).into())
    }
}

#[allow(dead_code)]
pub fn temp_store() -> (Arc<SharedStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = ConversationStore::load(tmp.path().join("memories.json"))
        .expect("failed to load conversation store");
    (Arc::new(SharedStore::new(store)), tmp)
}

#[allow(dead_code)]
pub fn agent_with(
    provider: Arc<MockProvider>,
    ledger: Arc<dyn ExpenseLedger>,
    store: Arc<SharedStore>,
) -> FinanceAgent {
    FinanceAgent::new(provider, ledger, store, "S/")
        .with_fixed_date(NaiveDate::from_ymd_opt(2024, 5, 3).expect("valid date"))
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
