use crate::error::CoreError;
use crate::models::{DeliveryStatus, Direction, Message};
use crate::store::ConversationStore;

const HOUR_MS: i64 = 3_600_000;
const MINUTE_MS: i64 = 60_000;
const DAY_MS: i64 = 86_400_000;

fn demo_message(
    id: &str,
    conversation_id: &str,
    text: &str,
    created_at: i64,
    direction: Direction,
    status: DeliveryStatus,
) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        text: text.to_string(),
        created_at,
        direction,
        status,
    }
}

/// Populates the store with the demo conversations the app ships with.
///
/// Summaries are projections, so the expected previews and unread badges
/// (2 / 0 / 3) fall out of the seeded messages rather than being set
/// directly. `now_ms` anchors the relative timestamps.
pub fn seed_demo(store: &ConversationStore, now_ms: i64) -> Result<(), CoreError> {
    store.register_conversation(
        "1",
        "Marie Dupont",
        Some("https://randomuser.me/api/portraits/women/1.jpg"),
    )?;
    store.register_conversation(
        "2",
        "Pierre Martin",
        Some("https://randomuser.me/api/portraits/men/1.jpg"),
    )?;
    store.register_conversation(
        "3",
        "Sophie Lambert",
        Some("https://randomuser.me/api/portraits/women/2.jpg"),
    )?;

    // Conversation 1: an hour of history, two messages still unread.
    store.append_message(demo_message(
        "demo:1:m1",
        "1",
        "Bonjour!",
        now_ms - HOUR_MS,
        Direction::Incoming,
        DeliveryStatus::Read,
    ))?;
    store.append_message(demo_message(
        "demo:1:m2",
        "1",
        "Comment allez-vous?",
        now_ms - 30 * MINUTE_MS,
        Direction::Outgoing,
        DeliveryStatus::Read,
    ))?;
    store.append_message(demo_message(
        "demo:1:m3",
        "1",
        "J'ai fini plus tôt ce soir.",
        now_ms - 11 * MINUTE_MS,
        Direction::Incoming,
        DeliveryStatus::Delivered,
    ))?;
    store.append_message(demo_message(
        "demo:1:m4",
        "1",
        "On se voit demain ?",
        now_ms - 10 * MINUTE_MS,
        Direction::Incoming,
        DeliveryStatus::Delivered,
    ))?;

    // Conversation 2: settled, nothing unread.
    store.append_message(demo_message(
        "demo:2:m1",
        "2",
        "Je t'envoie le document.",
        now_ms - 2 * HOUR_MS,
        Direction::Outgoing,
        DeliveryStatus::Read,
    ))?;
    store.append_message(demo_message(
        "demo:2:m2",
        "2",
        "Super, merci !",
        now_ms - 2 * HOUR_MS + 5 * MINUTE_MS,
        Direction::Incoming,
        DeliveryStatus::Read,
    ))?;

    // Conversation 3: three unread.
    store.append_message(demo_message(
        "demo:3:m1",
        "3",
        "Tu as vu la photo ?",
        now_ms - 90 * MINUTE_MS,
        Direction::Incoming,
        DeliveryStatus::Delivered,
    ))?;
    store.append_message(demo_message(
        "demo:3:m2",
        "3",
        "J'ai une nouvelle à t'annoncer",
        now_ms - 89 * MINUTE_MS,
        Direction::Incoming,
        DeliveryStatus::Delivered,
    ))?;
    store.append_message(demo_message(
        "demo:3:m3",
        "3",
        "À bientôt !",
        now_ms - 88 * MINUTE_MS,
        Direction::Incoming,
        DeliveryStatus::Delivered,
    ))?;

    Ok(())
}

/// Builds a mock page of history for `load_older`, one message per day
/// before `before_ts`. Ids are derived from the cursor so a repeated fetch
/// of the same page merges as a no-op.
pub fn history_batch(conversation_id: &str, before_ts: i64, count: usize) -> Vec<Message> {
    (0..count)
        .map(|idx| {
            let created_at = before_ts - DAY_MS * (idx as i64 + 1);
            let direction = if idx % 2 == 0 {
                Direction::Incoming
            } else {
                Direction::Outgoing
            };
            demo_message(
                &format!("old:{}:{}", before_ts, idx),
                conversation_id,
                &format!("Message historique {}", idx + 1),
                created_at,
                direction,
                DeliveryStatus::Read,
            )
        })
        .collect()
}
