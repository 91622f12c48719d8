pub const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS conversation_messages (
      conversation_id TEXT PRIMARY KEY,
      payload TEXT NOT NULL,
      saved_at INTEGER NOT NULL
    );
    "#,
];
