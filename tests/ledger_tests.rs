use causerie_core::error::CoreError;
use causerie_core::ledger::MessageLedger;
use causerie_core::models::{DeliveryStatus, Direction, Message, MAX_MESSAGE_CHARS};

fn message(id: &str, created_at: i64, direction: Direction, status: DeliveryStatus) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: "1".to_string(),
        text: format!("message {}", id),
        created_at,
        direction,
        status,
    }
}

fn outgoing(id: &str, created_at: i64) -> Message {
    message(id, created_at, Direction::Outgoing, DeliveryStatus::Sent)
}

fn incoming(id: &str, created_at: i64, status: DeliveryStatus) -> Message {
    message(id, created_at, Direction::Incoming, status)
}

#[test]
fn append_places_message_newest_first() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 100)).expect("append m1");
    ledger.append(outgoing("m2", 200)).expect("append m2");
    assert_eq!(ledger.latest().expect("latest").id, "m2");
    assert_eq!(ledger.oldest().expect("oldest").id, "m1");
}

#[test]
fn append_rejects_empty_text() {
    let mut ledger = MessageLedger::new();
    let mut msg = outgoing("m1", 100);
    msg.text = "   ".to_string();
    let err = ledger.append(msg).expect_err("whitespace text");
    assert!(matches!(err, CoreError::InvalidMessage(_)));
    assert!(ledger.is_empty());
}

#[test]
fn append_rejects_over_length_text() {
    let mut ledger = MessageLedger::new();
    let mut msg = outgoing("m1", 100);
    msg.text = "é".repeat(MAX_MESSAGE_CHARS + 1);
    let err = ledger.append(msg).expect_err("over-length text");
    assert!(matches!(err, CoreError::InvalidMessage(_)));
}

#[test]
fn append_accepts_text_at_the_cap() {
    let mut ledger = MessageLedger::new();
    let mut msg = outgoing("m1", 100);
    msg.text = "é".repeat(MAX_MESSAGE_CHARS);
    ledger.append(msg).expect("text at cap");
    assert_eq!(ledger.len(), 1);
}

#[test]
fn append_rejects_duplicate_id() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 100)).expect("append");
    let err = ledger.append(outgoing("m1", 200)).expect_err("duplicate id");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn append_rejects_message_older_than_newest() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 200)).expect("append");
    let err = ledger.append(outgoing("m2", 100)).expect_err("stale append");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
}

#[test]
fn update_status_advances_forward() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 100)).expect("append");
    ledger
        .update_status("m1", DeliveryStatus::Delivered)
        .expect("to delivered");
    ledger.update_status("m1", DeliveryStatus::Read).expect("to read");
    assert_eq!(ledger.get("m1").expect("m1").status, DeliveryStatus::Read);
}

#[test]
fn update_status_same_status_is_a_no_op() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 100)).expect("append");
    ledger
        .update_status("m1", DeliveryStatus::Delivered)
        .expect("to delivered");
    ledger
        .update_status("m1", DeliveryStatus::Delivered)
        .expect("repeat delivered");
    assert_eq!(ledger.get("m1").expect("m1").status, DeliveryStatus::Delivered);
}

#[test]
fn update_status_rejects_backward_transition() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 100)).expect("append");
    ledger.update_status("m1", DeliveryStatus::Read).expect("to read");
    let err = ledger
        .update_status("m1", DeliveryStatus::Delivered)
        .expect_err("backward move");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
    assert_eq!(ledger.get("m1").expect("m1").status, DeliveryStatus::Read);
}

#[test]
fn update_status_unknown_id_leaves_ledger_unchanged() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 100)).expect("append");
    let err = ledger
        .update_status("missing-id", DeliveryStatus::Delivered)
        .expect_err("unknown id");
    assert!(matches!(err, CoreError::NotFound(_)));
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.get("m1").expect("m1").status, DeliveryStatus::Sent);
}

#[test]
fn prepend_older_merges_below_oldest() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 1_000)).expect("append");
    ledger.append(outgoing("m2", 2_000)).expect("append");

    let batch = vec![
        incoming("h2", 400, DeliveryStatus::Read),
        incoming("h1", 500, DeliveryStatus::Read),
    ];
    let merged = ledger.prepend_older(batch).expect("merge");
    assert_eq!(merged, 2);

    let ids: Vec<&str> = ledger.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m1", "h1", "h2"]);
    for pair in ledger.messages().windows(2) {
        assert!(pair[0].created_at > pair[1].created_at);
    }
}

#[test]
fn prepend_older_skips_already_known_ids() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 1_000)).expect("append");
    let batch = vec![
        incoming("h1", 500, DeliveryStatus::Read),
        incoming("h1", 500, DeliveryStatus::Read),
    ];
    let merged = ledger.prepend_older(batch).expect("merge");
    assert_eq!(merged, 1);

    // Re-fetching the same page merges nothing.
    let merged = ledger
        .prepend_older(vec![incoming("h1", 500, DeliveryStatus::Read)])
        .expect("repeat merge");
    assert_eq!(merged, 0);
    assert_eq!(ledger.len(), 2);
}

#[test]
fn prepend_older_rejects_overlapping_batch() {
    let mut ledger = MessageLedger::new();
    ledger.append(outgoing("m1", 1_000)).expect("append");
    let err = ledger
        .prepend_older(vec![incoming("h1", 1_500, DeliveryStatus::Read)])
        .expect_err("overlap");
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn unread_counts_incoming_not_yet_read() {
    let mut ledger = MessageLedger::new();
    ledger
        .append(incoming("m1", 100, DeliveryStatus::Read))
        .expect("append");
    ledger
        .append(incoming("m2", 200, DeliveryStatus::Delivered))
        .expect("append");
    ledger.append(outgoing("m3", 300)).expect("append");
    assert_eq!(ledger.unread_count(), 1);

    let changed = ledger.mark_all_read();
    assert_eq!(changed, 1);
    assert_eq!(ledger.unread_count(), 0);
    // Outgoing messages are untouched.
    assert_eq!(ledger.get("m3").expect("m3").status, DeliveryStatus::Sent);
}
