use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::CoreError;
use crate::models::{DeliveryStatus, Message};
use crate::store::ConversationStore;

/// Decides whether an automated reply is synthesized for a sent message.
/// Returning `None` drops the reply.
pub type ReplyPolicy = Box<dyn Fn(&Message) -> Option<String> + Send + Sync>;

/// Delays for the simulated delivery lifecycle, both measured from the
/// moment a message is sent.
#[derive(Debug, Clone, Copy)]
pub struct SimulatorConfig {
    /// How long until a sent message is marked delivered.
    pub delivery_delay: Duration,
    /// How long until the automated reply arrives.
    pub reply_delay: Duration,
}

impl Default for SimulatorConfig {
    // The reference client waited 1 s before confirming delivery and a
    // further 3 s before the responder answered.
    fn default() -> Self {
        Self {
            delivery_delay: Duration::from_secs(1),
            reply_delay: Duration::from_secs(4),
        }
    }
}

/// The reference client's responder: echoes the sent text back.
pub fn auto_reply(message: &Message) -> Option<String> {
    Some(format!("Réponse automatique à : {}", message.text))
}

/// Drives the status lifecycle of freshly sent messages with deferred,
/// cancellable tasks.
///
/// Each scheduled task re-checks the liveness flag immediately before
/// touching the store, so a task that was already queued when `cancel` ran
/// cannot mutate a discarded conversation. Failures inside a task are logged
/// and dropped; nothing is waiting on them and nothing is retried.
pub struct DeliverySimulator {
    store: Arc<ConversationStore>,
    config: SimulatorConfig,
    reply_policy: ReplyPolicy,
    live: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliverySimulator {
    pub fn new(store: Arc<ConversationStore>, config: SimulatorConfig) -> Self {
        Self {
            store,
            config,
            reply_policy: Box::new(auto_reply),
            live: Arc::new(AtomicBool::new(true)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply_policy(mut self, policy: ReplyPolicy) -> Self {
        self.reply_policy = policy;
        self
    }

    /// Sends a message through the store and schedules its lifecycle, the
    /// composite operation a conversation view performs on send.
    pub fn send(&self, conversation_id: &str, text: &str) -> Result<Message, CoreError> {
        let message = self.store.send_message(conversation_id, text)?;
        self.message_sent(&message);
        Ok(message)
    }

    /// Schedules the delivered transition and the optional automated reply
    /// for an already-appended outgoing message. A no-op for incoming
    /// messages and after cancellation.
    pub fn message_sent(&self, message: &Message) {
        if !message.is_outgoing() || !self.live.load(Ordering::SeqCst) {
            return;
        }

        let delivery = {
            let store = Arc::clone(&self.store);
            let live = Arc::clone(&self.live);
            let delay = self.config.delivery_delay;
            let conversation_id = message.conversation_id.clone();
            let message_id = message.id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if !live.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(err) =
                    store.update_status(&conversation_id, &message_id, DeliveryStatus::Delivered)
                {
                    warn!(%conversation_id, %message_id, error = %err, "delivery update dropped");
                }
            })
        };

        let reply = (self.reply_policy)(message).map(|text| {
            let store = Arc::clone(&self.store);
            let live = Arc::clone(&self.live);
            let delay = self.config.reply_delay;
            let conversation_id = message.conversation_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if !live.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(err) = store.receive_message(&conversation_id, &text) {
                    warn!(%conversation_id, error = %err, "synthetic reply dropped");
                }
            })
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.retain(|handle| !handle.is_finished());
        tasks.push(delivery);
        if let Some(reply) = reply {
            tasks.push(reply);
        }
    }

    /// Tears the simulator down: no scheduled task may touch the store after
    /// this returns, and new sends are no longer scheduled.
    pub fn cancel(&self) {
        self.live.store(false, Ordering::SeqCst);
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.live.load(Ordering::SeqCst)
    }
}

impl Drop for DeliverySimulator {
    fn drop(&mut self) {
        self.cancel();
    }
}
