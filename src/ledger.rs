use tracing::debug;

use crate::error::CoreError;
use crate::models::{DeliveryStatus, Message, MAX_MESSAGE_CHARS};

/// Ordered message sequence for a single conversation.
///
/// Messages are held newest-first, the order the conversation view renders.
/// `append` feeds the newest end, `prepend_older` the oldest (pagination);
/// between them the sequence stays descending by `created_at` with arrival
/// order breaking ties, and no id appears twice.
#[derive(Debug, Default)]
pub struct MessageLedger {
    messages: Vec<Message>,
}

pub fn validate_text(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::InvalidMessage("message text is empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::InvalidMessage(format!(
            "message text exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

impl MessageLedger {
    pub fn new() -> Self {
        Self { messages: Vec::new() }
    }

    /// Inserts a message at the newest position.
    pub fn append(&mut self, message: Message) -> Result<(), CoreError> {
        validate_text(&message.text)?;
        if self.contains(&message.id) {
            return Err(CoreError::InvalidArgument(format!(
                "duplicate message id: {}",
                message.id
            )));
        }
        if let Some(newest) = self.messages.first() {
            if message.created_at < newest.created_at {
                return Err(CoreError::InvalidArgument(
                    "appended message is older than the newest entry".to_string(),
                ));
            }
        }
        self.messages.insert(0, message);
        Ok(())
    }

    /// Merges a batch of historical messages below the current oldest entry.
    ///
    /// Entries whose id is already present are skipped (a repeated page is
    /// not an error). The remaining entries must be strictly older than the
    /// current oldest message; otherwise the whole batch is rejected and the
    /// ledger is left untouched. Returns how many entries were merged.
    pub fn prepend_older(&mut self, batch: Vec<Message>) -> Result<usize, CoreError> {
        let oldest_ts = self.messages.last().map(|m| m.created_at);
        let mut fresh: Vec<Message> = Vec::with_capacity(batch.len());
        for message in batch {
            if self.contains(&message.id) || fresh.iter().any(|m| m.id == message.id) {
                debug!(message_id = %message.id, "skipping duplicate history entry");
                continue;
            }
            if let Some(oldest_ts) = oldest_ts {
                if message.created_at >= oldest_ts {
                    return Err(CoreError::InvalidArgument(
                        "history batch overlaps existing messages".to_string(),
                    ));
                }
            }
            fresh.push(message);
        }
        // Newest-first within the merged tail.
        fresh.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let merged = fresh.len();
        self.messages.extend(fresh);
        Ok(merged)
    }

    /// Advances a message's delivery status. Moving backward is an error;
    /// re-applying the current status is a no-op so a late duplicate callback
    /// cannot fail.
    pub fn update_status(
        &mut self,
        message_id: &str,
        new_status: DeliveryStatus,
    ) -> Result<(), CoreError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| CoreError::NotFound(format!("message not found: {}", message_id)))?;
        if new_status < message.status {
            return Err(CoreError::InvalidTransition {
                from: message.status,
                to: new_status,
            });
        }
        message.status = new_status;
        Ok(())
    }

    /// Marks every incoming message as read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for message in &mut self.messages {
            if message.is_incoming() && message.status != DeliveryStatus::Read {
                message.status = DeliveryStatus::Read;
                changed += 1;
            }
        }
        changed
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn oldest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.get(message_id).is_some()
    }

    /// Newest-first view of the sequence.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn unread_count(&self) -> i64 {
        self.messages
            .iter()
            .filter(|m| m.is_incoming() && m.status != DeliveryStatus::Read)
            .count() as i64
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replaces the whole sequence from a persisted snapshot, newest first.
    pub fn restore(&mut self, mut messages: Vec<Message>) {
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.dedup_by(|a, b| a.id == b.id);
        self.messages = messages;
    }
}
