//! Per-sender conversation memory
//!
//! Every sender owns an append-only transcript of human and model turns.
//! The whole store lives in one JSON file that is read once at startup and
//! rewritten after each processed message.

pub mod shared;
pub mod types;

pub use shared::SharedStore;
pub use types::{Role, Transcript, Turn};

use crate::error::{FinbotError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Durable mapping from sender identifier to transcript
///
/// # Examples
///
/// ```
/// use finbot::memory::{ConversationStore, Turn};
///
/// # fn main() -> finbot::error::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("memories.json");
///
/// let mut store = ConversationStore::load(&path)?;
/// store.get_or_create("alice").push(Turn::human("Spent 12 on lunch"));
/// store.save()?;
///
/// let reloaded = ConversationStore::load(&path)?;
/// assert_eq!(reloaded.transcript("alice").map(|t| t.len()), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
    transcripts: BTreeMap<String, Transcript>,
}

impl ConversationStore {
    /// Create an empty store that will be written to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            transcripts: BTreeMap::new(),
        }
    }

    /// Load the store from `path`
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns `FinbotError::Memory` if the file exists but cannot be read
    /// or does not hold a valid transcript map
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            tracing::info!(path = %path.display(), "No conversation store found, starting empty");
            return Ok(Self::empty(path));
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            FinbotError::Memory(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let transcripts: BTreeMap<String, Transcript> = if contents.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                FinbotError::Memory(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        tracing::info!(
            path = %path.display(),
            senders = transcripts.len(),
            "Loaded conversation store"
        );

        Ok(Self { path, transcripts })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the sender's transcript, creating an empty one on first use
    pub fn get_or_create(&mut self, sender: &str) -> &mut Transcript {
        self.transcripts.entry(sender.to_string()).or_default()
    }

    /// Read-only access to a sender's transcript
    pub fn transcript(&self, sender: &str) -> Option<&Transcript> {
        self.transcripts.get(sender)
    }

    /// Iterate over senders and their turn counts, ordered by sender
    pub fn senders(&self) -> impl Iterator<Item = (&str, usize)> {
        self.transcripts.iter().map(|(s, t)| (s.as_str(), t.len()))
    }

    /// Number of senders with a transcript
    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    /// Whether the store holds no transcripts
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    /// Serialize the whole store and replace the backing file
    ///
    /// The JSON is written to a sibling temporary file first and renamed over
    /// the target, so readers never observe a half-written store.
    ///
    /// # Errors
    ///
    /// Returns `FinbotError::Memory` if serialization or any file operation fails
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.transcripts)
            .map_err(|e| FinbotError::Memory(format!("Serialization failed: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FinbotError::Memory(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, json).map_err(|e| {
            FinbotError::Memory(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            FinbotError::Memory(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), senders = self.len(), "Saved conversation store");
        Ok(())
    }
}
