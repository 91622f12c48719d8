use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::CoreError;
use crate::ledger::MessageLedger;
use crate::models::{ConversationSummary, DeliveryStatus, Direction, Message};
use crate::storage::MessageStore;

/// Notified with `(conversation_id, text)` after every successful append of
/// an outgoing message, so an external conversation-list view can refresh
/// without the store depending on it.
pub type LastMessageCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

struct ConversationEntry {
    summary: ConversationSummary,
    ledger: MessageLedger,
}

/// In-memory conversation registry: one ledger per conversation plus its
/// derived summary.
///
/// Every mutation runs under a single mutex and recomputes the owning
/// conversation's summary before the lock is released, so a reader can never
/// observe a summary that disagrees with its ledger. The mutex also
/// serializes `append_message` against `load_older`; the two ends of a
/// ledger cannot be mutated concurrently.
pub struct ConversationStore {
    inner: Mutex<Vec<ConversationEntry>>,
    on_last_message: Option<LastMessageCallback>,
    storage: Option<Box<dyn MessageStore>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            on_last_message: None,
            storage: None,
        }
    }

    /// Attaches the optional durability collaborator. Saves are best-effort:
    /// failures are logged and never surfaced to callers.
    pub fn with_storage(mut self, storage: Box<dyn MessageStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_last_message_callback(mut self, callback: LastMessageCallback) -> Self {
        self.on_last_message = Some(callback);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConversationEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register_conversation(
        &self,
        conversation_id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), CoreError> {
        let mut entries = self.lock();
        if entries.iter().any(|e| e.summary.conversation_id == conversation_id) {
            return Err(CoreError::InvalidArgument(format!(
                "conversation already registered: {}",
                conversation_id
            )));
        }
        entries.push(ConversationEntry {
            summary: ConversationSummary {
                conversation_id: conversation_id.to_string(),
                display_name: display_name.to_string(),
                avatar_url: avatar_url.map(|s| s.to_string()),
                last_message_preview: None,
                last_message_at: None,
                unread_count: 0,
            },
            ledger: MessageLedger::new(),
        });
        Ok(())
    }

    pub fn conversation_exists(&self, conversation_id: &str) -> bool {
        self.lock()
            .iter()
            .any(|e| e.summary.conversation_id == conversation_id)
    }

    /// Appends a message to its conversation's ledger and re-derives the
    /// summary in the same critical section. Outgoing appends notify the
    /// list-view callback after the lock is released.
    pub fn append_message(&self, message: Message) -> Result<(), CoreError> {
        let conversation_id = message.conversation_id.clone();
        let notify = message.is_outgoing().then(|| message.text.clone());
        {
            let mut entries = self.lock();
            let entry = entry_mut(&mut entries, &conversation_id)?;
            entry.ledger.append(message)?;
            recompute(entry);
            self.persist(entry);
        }
        if let (Some(callback), Some(text)) = (&self.on_last_message, notify) {
            callback(&conversation_id, &text);
        }
        Ok(())
    }

    /// Composes and appends an outgoing message. It enters the ledger as
    /// `Sent`; the delivery simulator advances it from there.
    pub fn send_message(&self, conversation_id: &str, text: &str) -> Result<Message, CoreError> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now().timestamp_millis(),
            direction: Direction::Outgoing,
            status: DeliveryStatus::Sent,
        };
        self.append_message(message.clone())?;
        Ok(message)
    }

    /// Appends an incoming message. It arrives `Delivered` and counts as
    /// unread until the conversation is marked read.
    pub fn receive_message(&self, conversation_id: &str, text: &str) -> Result<Message, CoreError> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now().timestamp_millis(),
            direction: Direction::Incoming,
            status: DeliveryStatus::Delivered,
        };
        self.append_message(message.clone())?;
        Ok(message)
    }

    /// Merges a page of older messages (pagination). Returns how many
    /// entries were new.
    pub fn load_older(
        &self,
        conversation_id: &str,
        batch: Vec<Message>,
    ) -> Result<usize, CoreError> {
        let mut entries = self.lock();
        let entry = entry_mut(&mut entries, conversation_id)?;
        let merged = entry.ledger.prepend_older(batch)?;
        recompute(entry);
        self.persist(entry);
        Ok(merged)
    }

    pub fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        new_status: DeliveryStatus,
    ) -> Result<(), CoreError> {
        let mut entries = self.lock();
        let entry = entry_mut(&mut entries, conversation_id)?;
        entry.ledger.update_status(message_id, new_status)?;
        recompute(entry);
        self.persist(entry);
        Ok(())
    }

    /// Marks every incoming message in the conversation as read. Returns how
    /// many messages changed.
    pub fn mark_conversation_read(&self, conversation_id: &str) -> Result<usize, CoreError> {
        let mut entries = self.lock();
        let entry = entry_mut(&mut entries, conversation_id)?;
        let changed = entry.ledger.mark_all_read();
        recompute(entry);
        if changed > 0 {
            self.persist(entry);
        }
        Ok(changed)
    }

    pub fn summary(&self, conversation_id: &str) -> Result<ConversationSummary, CoreError> {
        let entries = self.lock();
        let entry = entry_ref(&entries, conversation_id)?;
        Ok(entry.summary.clone())
    }

    /// Newest-first snapshot of a conversation's messages.
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CoreError> {
        let entries = self.lock();
        let entry = entry_ref(&entries, conversation_id)?;
        Ok(entry.ledger.messages().to_vec())
    }

    /// Conversations whose display name or last message contains the filter,
    /// case-insensitively. An empty filter returns everything. Registration
    /// order is preserved.
    pub fn list_conversations(&self, filter: &str) -> Vec<ConversationSummary> {
        let needle = filter.trim().to_lowercase();
        self.lock()
            .iter()
            .filter(|entry| {
                if needle.is_empty() {
                    return true;
                }
                let summary = &entry.summary;
                summary.display_name.to_lowercase().contains(&needle)
                    || summary
                        .last_message_preview
                        .as_deref()
                        .is_some_and(|preview| preview.to_lowercase().contains(&needle))
            })
            .map(|entry| entry.summary.clone())
            .collect()
    }

    /// Seeds the ledger from the storage collaborator, if one is attached and
    /// holds a snapshot for this conversation. A failed load leaves the
    /// ledger as it was rather than failing the caller. Returns how many
    /// messages were restored.
    pub fn hydrate(&self, conversation_id: &str) -> Result<usize, CoreError> {
        let mut entries = self.lock();
        let entry = entry_mut(&mut entries, conversation_id)?;
        let Some(storage) = &self.storage else {
            return Ok(0);
        };
        match storage.load(conversation_id) {
            Ok(Some(messages)) => {
                let count = messages.len();
                entry.ledger.restore(messages);
                recompute(entry);
                Ok(count)
            }
            Ok(None) => Ok(0),
            Err(err) => {
                warn!(conversation_id, error = %err, "failed to load persisted messages");
                Ok(0)
            }
        }
    }

    fn persist(&self, entry: &ConversationEntry) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.save(&entry.summary.conversation_id, entry.ledger.messages())
            {
                warn!(
                    conversation_id = %entry.summary.conversation_id,
                    error = %err,
                    "failed to persist messages"
                );
            }
        }
    }
}

fn entry_mut<'a>(
    entries: &'a mut Vec<ConversationEntry>,
    conversation_id: &str,
) -> Result<&'a mut ConversationEntry, CoreError> {
    entries
        .iter_mut()
        .find(|e| e.summary.conversation_id == conversation_id)
        .ok_or_else(|| CoreError::NotFound(format!("conversation not found: {}", conversation_id)))
}

fn entry_ref<'a>(
    entries: &'a [ConversationEntry],
    conversation_id: &str,
) -> Result<&'a ConversationEntry, CoreError> {
    entries
        .iter()
        .find(|e| e.summary.conversation_id == conversation_id)
        .ok_or_else(|| CoreError::NotFound(format!("conversation not found: {}", conversation_id)))
}

/// The summary is a projection of the ledger: preview and timestamp from the
/// newest message, unread count from the live incoming-unread tally.
fn recompute(entry: &mut ConversationEntry) {
    let latest = entry.ledger.latest();
    entry.summary.last_message_preview = latest.map(|m| m.text.clone());
    entry.summary.last_message_at = latest.map(|m| m.created_at);
    entry.summary.unread_count = entry.ledger.unread_count();
}
