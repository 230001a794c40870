//! Concurrent access to the conversation store
//!
//! The store itself sits behind a short-lived mutex that is never held across
//! network or file I/O. Requests from the same sender are additionally
//! serialized by a per-sender async lock, so one sender's exchanges never
//! interleave while different senders proceed in parallel.

use super::{ConversationStore, Turn};
use crate::error::{FinbotError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SenderLocks = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Process-wide handle to the conversation store
#[derive(Debug)]
pub struct SharedStore {
    store: Mutex<ConversationStore>,
    sender_locks: SenderLocks,
    // Orders flushes so an older snapshot never overwrites a newer one
    save_lock: AsyncMutex<()>,
}

/// Exclusive use of one sender's transcript
///
/// Dropping the guard releases the sender and forgets its lock once no other
/// request is waiting for it.
#[derive(Debug)]
pub struct SenderGuard {
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<AsyncMutex<()>>,
    sender: String,
    locks: SenderLocks,
}

impl Drop for SenderGuard {
    fn drop(&mut self) {
        self.guard.take();
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // Entries are only cloned under the table lock, so a count of two
        // (the table and this guard) means nobody else holds or awaits it.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.sender);
        }
    }
}

impl SharedStore {
    /// Wrap a loaded store
    pub fn new(store: ConversationStore) -> Self {
        Self {
            store: Mutex::new(store),
            sender_locks: Arc::new(Mutex::new(HashMap::new())),
            save_lock: AsyncMutex::new(()),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, ConversationStore>> {
        self.store
            .lock()
            .map_err(|_| FinbotError::Memory("Failed to acquire conversation store lock".into()).into())
    }

    /// Wait for exclusive use of `sender`'s transcript
    ///
    /// The returned guard must be held for the whole request.
    pub async fn lock_sender(&self, sender: &str) -> Result<SenderGuard> {
        let lock = {
            let mut locks = self
                .sender_locks
                .lock()
                .map_err(|_| FinbotError::Memory("Failed to acquire sender lock table".into()))?;
            locks
                .entry(sender.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        Ok(SenderGuard {
            guard: Some(guard),
            lock,
            sender: sender.to_string(),
            locks: Arc::clone(&self.sender_locks),
        })
    }

    /// Append a turn to `sender`'s transcript
    pub fn append(&self, sender: &str, turn: Turn) -> Result<()> {
        self.store()?.get_or_create(sender).push(turn);
        Ok(())
    }

    /// Copy of `sender`'s turns, oldest first (empty for unknown senders)
    pub fn snapshot(&self, sender: &str) -> Result<Vec<Turn>> {
        Ok(self
            .store()?
            .transcript(sender)
            .map(|t| t.turns().to_vec())
            .unwrap_or_default())
    }

    /// Flush the entire store to disk
    ///
    /// The store is copied under its mutex and written from the blocking
    /// pool, so appends for other senders are not held up by file I/O.
    pub async fn save(&self) -> Result<()> {
        let _ordered = self.save_lock.lock().await;
        let copy = self.store()?.clone();
        tokio::task::spawn_blocking(move || copy.save())
            .await
            .map_err(|e| FinbotError::Memory(format!("Save task failed: {}", e)))?
    }

    /// Number of turns recorded for `sender`
    pub fn turn_count(&self, sender: &str) -> Result<usize> {
        Ok(self.store()?.transcript(sender).map_or(0, |t| t.len()))
    }
}
