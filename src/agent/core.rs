//! Expense extraction pipeline
//!
//! For each inbound message the agent:
//! - Turns text, audio or an image into plain text
//! - Appends it to the sender's transcript and asks the model for a reply
//! - Records a completed expense in the ledger and confirms it
//! - Flushes the conversation store
//!
//! Requests from the same sender are handled one at a time.

use super::reply::ExtractionReply;
use crate::error::{FinbotError, Result};
use crate::ledger::{ExpenseLedger, ExpenseRecord};
use crate::media::{self, MediaKind};
use crate::memory::{SharedStore, Turn};
use crate::prompts;
use crate::providers::Provider;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reply for unrecognized media tags
pub const UNSUPPORTED_MESSAGE: &str = "Tipo de mensaje no soportado.";

/// Detail of the invalid-request error for a blank sender identifier
pub const MISSING_SENDER: &str = "message sender is missing";

/// One message received from the chat gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender identifier (e.g. a phone number)
    pub sender: String,
    /// Literal text, or base64 for audio and images
    pub content: String,
    /// Media tag such as `text` or `image/jpeg`
    pub mimetype: String,
    /// Original attachment name, if any
    pub filename: Option<String>,
}

impl InboundMessage {
    /// Convenience constructor for text messages
    pub fn text(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            mimetype: media::TEXT_TAG.to_string(),
            filename: None,
        }
    }
}

/// Outcome of processing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// Clarification question or expense confirmation
    Response(String),
    /// Handled failure, already phrased for the user
    Error(String),
}

impl AgentReply {
    /// Whether this reply reports a failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Text to show the user
    pub fn message(&self) -> &str {
        match self {
            Self::Response(text) | Self::Error(text) => text,
        }
    }
}

/// Chat agent that turns expense reports into ledger rows
///
/// # Examples
///
/// ```no_run
/// use finbot::agent::{FinanceAgent, InboundMessage};
/// use finbot::config::Config;
/// use finbot::ledger::PostgresLedger;
/// use finbot::memory::{ConversationStore, SharedStore};
/// use finbot::providers::create_provider;
/// use std::sync::Arc;
///
/// # async fn example() -> finbot::error::Result<()> {
/// let config = Config::default();
/// let store = Arc::new(SharedStore::new(ConversationStore::load(&config.memory.path)?));
/// let agent = FinanceAgent::new(
///     create_provider(&config)?,
///     Arc::new(PostgresLedger::new(&config.database)?),
///     store,
///     config.ledger.currency_symbol.clone(),
/// );
///
/// let reply = agent
///     .process_message(InboundMessage::text("51999888777", "Taxi 15 soles"))
///     .await;
/// println!("{}", reply.message());
/// # Ok(())
/// # }
/// ```
pub struct FinanceAgent {
    provider: Arc<dyn Provider>,
    ledger: Arc<dyn ExpenseLedger>,
    store: Arc<SharedStore>,
    currency_symbol: String,
    fixed_date: Option<NaiveDate>,
}

impl FinanceAgent {
    /// Creates a new agent
    ///
    /// # Arguments
    ///
    /// * `provider` - Model used for chat, transcription and OCR
    /// * `ledger` - Destination for completed expenses
    /// * `store` - Shared conversation store
    /// * `currency_symbol` - Symbol shown in confirmations
    pub fn new(
        provider: Arc<dyn Provider>,
        ledger: Arc<dyn ExpenseLedger>,
        store: Arc<SharedStore>,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            ledger,
            store,
            currency_symbol: currency_symbol.into(),
            fixed_date: None,
        }
    }

    /// Use `date` as "today" instead of the local clock
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    /// Shared conversation store
    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        self.fixed_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Process one inbound message end to end
    ///
    /// Never fails: every problem is turned into an [`AgentReply::Error`]
    /// with a user-facing message. Extraction failures leave the transcript
    /// untouched; every later outcome is recorded and flushed.
    pub async fn process_message(&self, message: InboundMessage) -> AgentReply {
        // The sender is an opaque key; only a blank one is rejected
        let sender = message.sender.as_str();
        if sender.trim().is_empty() {
            let err = FinbotError::InvalidRequest(MISSING_SENDER.to_string());
            warn!("Rejected message: {}", err);
            return AgentReply::Error(err.to_string());
        }

        let kind = MediaKind::classify(&message.mimetype);
        info!(
            sender = %sender,
            kind = kind.label(),
            filename = message.filename.as_deref().unwrap_or(""),
            content_len = message.content.len(),
            "Processing message"
        );

        if let MediaKind::Unsupported(tag) = &kind {
            warn!(mimetype = %tag, "Unsupported message type");
            return AgentReply::Error(UNSUPPORTED_MESSAGE.to_string());
        }

        let _guard = match self.store.lock_sender(sender).await {
            Ok(guard) => guard,
            Err(e) => {
                error!("Failed to lock sender transcript: {}", e);
                return AgentReply::Error(generic_failure(&e));
            }
        };

        let text = match media::extract_text(self.provider.as_ref(), &kind, &message.content).await {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = kind.label(), "Text extraction failed: {}", e);
                return AgentReply::Error(extraction_failure(&kind, &e));
            }
        };

        let reply = match self.converse(sender, text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Message processing failed: {}", e);
                let text = generic_failure(&e);
                if let Err(append_err) = self.store.append(sender, Turn::ai(text.clone())) {
                    error!("Failed to record failure turn: {}", append_err);
                }
                AgentReply::Error(text)
            }
        };

        self.flush().await;
        reply
    }

    /// Steps after extraction: model call, reply handling, ledger write
    async fn converse(&self, sender: &str, text: String) -> Result<AgentReply> {
        self.store.append(sender, Turn::human(text))?;

        let system = prompts::build_system_prompt(self.today(), &self.currency_symbol);
        let turns = self.store.snapshot(sender)?;
        debug!(turns = turns.len(), "Sending transcript to model");

        let completion = self.provider.complete(&system, &turns).await?;
        let raw = completion.text;
        info!(reply_len = raw.len(), "Model replied");
        self.store.append(sender, Turn::ai(raw.clone()))?;

        match ExtractionReply::parse(&raw) {
            ExtractionReply::Clarification(text) => {
                debug!("Model asked for more information");
                Ok(AgentReply::Response(text))
            }
            ExtractionReply::Malformed(reason) => {
                warn!(reason = %reason, "Model reply carried a malformed record");
                let text = malformed_message(&reason);
                self.store.append(sender, Turn::ai(text.clone()))?;
                Ok(AgentReply::Error(text))
            }
            ExtractionReply::Completion(record) => self.record(sender, record).await,
        }
    }

    async fn record(&self, sender: &str, record: ExpenseRecord) -> Result<AgentReply> {
        match self.ledger.insert(&record).await {
            Ok(()) => {
                let confirmation = record.confirmation(&self.currency_symbol);
                info!(
                    category = %record.category,
                    amount = %record.amount,
                    date = %record.date,
                    "Expense recorded"
                );
                self.store.append(sender, Turn::ai(confirmation.clone()))?;
                Ok(AgentReply::Response(confirmation))
            }
            Err(e) => {
                error!("Ledger insert failed: {}", e);
                let text = match e.downcast_ref::<FinbotError>() {
                    Some(FinbotError::Storage(message)) => message.clone(),
                    _ => format!("Error al registrar gasto: {}", e),
                };
                self.store.append(sender, Turn::ai(text.clone()))?;
                Ok(AgentReply::Error(text))
            }
        }
    }

    async fn flush(&self) {
        if let Err(e) = self.store.save().await {
            error!("Failed to save conversation store: {}", e);
        }
    }
}

fn generic_failure(error: &anyhow::Error) -> String {
    format!(
        "No se pudo procesar el mensaje. Intente nuevamente o use texto. Error: {}",
        error
    )
}

fn malformed_message(reason: &str) -> String {
    format!(
        "No se pudo registrar el gasto: {}. Por favor, envía nuevamente los datos.",
        reason
    )
}

fn extraction_failure(kind: &MediaKind, error: &anyhow::Error) -> String {
    match error.downcast_ref::<FinbotError>() {
        Some(FinbotError::Decode(detail)) => {
            format!("Error: el contenido adjunto no es base64 válido. {}", detail)
        }
        _ => match kind {
            MediaKind::Audio(_) => {
                "Error: No se pudo transcribir el audio. Intente nuevamente.".to_string()
            }
            MediaKind::Image(_) => {
                "Error: No se pudo extraer texto de la imagen. Intente nuevamente.".to_string()
            }
            _ => generic_failure(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Category;
    use crate::memory::{ConversationStore, Role};
    use crate::test_utils::{temp_dir, temp_store, RecordingLedger, ScriptedProvider};

    const COMPLETE: &str =
        "REGISTRAR: tipo=gasto, valor=15.00, categoria=Transporte, date=2024-05-03, descripcion=Taxi";

    fn agent(
        provider: Arc<ScriptedProvider>,
        ledger: Arc<RecordingLedger>,
        store: Arc<SharedStore>,
    ) -> FinanceAgent {
        FinanceAgent::new(provider, ledger, store, "S/")
            .with_fixed_date(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
    }

    #[tokio::test]
    async fn test_complete_message_records_expense() {
        let dir = temp_dir();
        let store = temp_store(&dir);
        let provider = Arc::new(ScriptedProvider::new([COMPLETE]));
        let ledger = Arc::new(RecordingLedger::new());
        let agent = agent(provider.clone(), ledger.clone(), store.clone());

        let reply = agent
            .process_message(InboundMessage::text("alice", "Taxi 15 soles hoy"))
            .await;

        assert_eq!(
            reply,
            AgentReply::Response("Gasto registrado: Transporte - S/ 15.00 el 2024-05-03. Taxi".to_string())
        );
        assert_eq!(ledger.row_count(), 1);
        assert_eq!(ledger.rows.lock().unwrap()[0].category, Category::Transport);

        let turns = store.snapshot("alice").unwrap();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Human, Role::Ai, Role::Ai]);
        assert_eq!(turns[1].content, COMPLETE);

        let saved = ConversationStore::load(dir.path().join("memories.json")).unwrap();
        assert_eq!(saved.transcript("alice").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_system_prompt_carries_today() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new(["¿Cuánto?"]));
        let agent = agent(provider.clone(), Arc::new(RecordingLedger::new()), temp_store(&dir));

        agent.process_message(InboundMessage::text("alice", "taxi")).await;

        let systems = provider.systems.lock().unwrap();
        assert!(systems[0].contains("2024-05-03"));
    }

    #[tokio::test]
    async fn test_history_is_sent_with_each_call() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new(["¿Cuánto gastaste?", COMPLETE]));
        let agent = agent(provider.clone(), Arc::new(RecordingLedger::new()), temp_store(&dir));

        agent.process_message(InboundMessage::text("alice", "taxi")).await;
        agent.process_message(InboundMessage::text("alice", "15 soles")).await;

        let calls = provider.completions.lock().unwrap();
        assert_eq!(calls[0].len(), 1);
        assert_eq!(calls[1].len(), 3);
        assert_eq!(calls[1][2], Turn::human("15 soles"));
    }

    #[tokio::test]
    async fn test_empty_sender_is_rejected() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new([COMPLETE]));
        let store = temp_store(&dir);
        let agent = agent(provider.clone(), Arc::new(RecordingLedger::new()), store.clone());

        let reply = agent.process_message(InboundMessage::text("  ", "taxi")).await;

        assert_eq!(
            reply,
            AgentReply::Error("Invalid request: message sender is missing".to_string())
        );
        assert_eq!(provider.completion_count(), 0);
        assert!(!dir.path().join("memories.json").exists());
    }

    #[tokio::test]
    async fn test_model_failure_is_recorded_and_flushed() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::default().then_fail("quota exceeded"));
        let ledger = Arc::new(RecordingLedger::new());
        let store = temp_store(&dir);
        let agent = agent(provider, ledger.clone(), store.clone());

        let reply = agent.process_message(InboundMessage::text("alice", "taxi")).await;

        assert!(reply.is_error());
        assert!(reply.message().starts_with("No se pudo procesar el mensaje"));
        assert!(reply.message().contains("quota exceeded"));
        assert_eq!(ledger.row_count(), 0);

        let saved = ConversationStore::load(dir.path().join("memories.json")).unwrap();
        let turns = saved.transcript("alice").unwrap().turns().to_vec();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, reply.message());
    }

    #[tokio::test]
    async fn test_storage_failure_is_returned_and_recorded() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new([COMPLETE]));
        let ledger = Arc::new(RecordingLedger::failing("Error al registrar gasto: connection refused"));
        let store = temp_store(&dir);
        let agent = agent(provider, ledger, store.clone());

        let reply = agent.process_message(InboundMessage::text("alice", "taxi 15")).await;

        assert_eq!(
            reply,
            AgentReply::Error("Error al registrar gasto: connection refused".to_string())
        );
        let turns = store.snapshot("alice").unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].content, reply.message());
    }

    #[tokio::test]
    async fn test_malformed_record_is_reported() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new([
            "REGISTRAR: tipo=gasto, valor=10, categoria=Vivienda, date=2024-05-03, descripcion=Luz",
        ]));
        let ledger = Arc::new(RecordingLedger::new());
        let store = temp_store(&dir);
        let agent = agent(provider, ledger.clone(), store.clone());

        let reply = agent.process_message(InboundMessage::text("alice", "luz 10")).await;

        assert!(reply.is_error());
        assert!(reply.message().contains("Vivienda"));
        assert_eq!(ledger.row_count(), 0);
        assert_eq!(store.turn_count("alice").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_audio_uses_transcription() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new([COMPLETE]).with_media_text("taxi quince soles"));
        let store = temp_store(&dir);
        let agent = agent(provider.clone(), Arc::new(RecordingLedger::new()), store.clone());

        let reply = agent
            .process_message(InboundMessage {
                sender: "alice".to_string(),
                content: "aGVsbG8=".to_string(),
                mimetype: "audio/ogg; codecs=opus".to_string(),
                filename: Some("voice.ogg".to_string()),
            })
            .await;

        assert!(!reply.is_error());
        assert_eq!(*provider.media_calls.lock().unwrap(), 1);
        assert_eq!(store.snapshot("alice").unwrap()[0], Turn::human("taxi quince soles"));
    }

    #[tokio::test]
    async fn test_failed_image_ocr_leaves_transcript_untouched() {
        let dir = temp_dir();
        // No media text scripted, so OCR fails
        let provider = Arc::new(ScriptedProvider::new([COMPLETE]));
        let store = temp_store(&dir);
        let agent = agent(provider.clone(), Arc::new(RecordingLedger::new()), store.clone());

        let reply = agent
            .process_message(InboundMessage {
                sender: "alice".to_string(),
                content: "aGVsbG8=".to_string(),
                mimetype: "image/jpeg".to_string(),
                filename: None,
            })
            .await;

        assert!(reply.message().contains("imagen"));
        assert_eq!(provider.completion_count(), 0);
        assert_eq!(store.turn_count("alice").unwrap(), 0);
        assert!(!dir.path().join("memories.json").exists());
    }

    #[tokio::test]
    async fn test_sender_key_is_not_normalized() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new(["¿Cuánto?", "¿Cuánto?"]));
        let store = temp_store(&dir);
        let agent = agent(provider, Arc::new(RecordingLedger::new()), store.clone());

        agent.process_message(InboundMessage::text("alice", "taxi")).await;
        agent.process_message(InboundMessage::text(" alice", "bus")).await;

        assert_eq!(store.turn_count("alice").unwrap(), 2);
        assert_eq!(store.turn_count(" alice").unwrap(), 2);
        assert_eq!(store.snapshot(" alice").unwrap()[0], Turn::human("bus"));
    }
}
