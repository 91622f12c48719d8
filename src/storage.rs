use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CoreError;
use crate::migrations::MIGRATIONS;
use crate::models::Message;

/// Optional durability collaborator: a key-value snapshot of each
/// conversation's full message sequence, keyed by conversation id. The store
/// saves on every mutation and loads only when hydrating; failures on either
/// side are logged by the caller and never block ledger operations.
pub trait MessageStore: Send + Sync {
    fn save(&self, conversation_id: &str, messages: &[Message]) -> Result<(), CoreError>;
    fn load(&self, conversation_id: &str) -> Result<Option<Vec<Message>>, CoreError>;
}

/// SQLite-backed snapshot store. One row per conversation, the payload being
/// the serialized message sequence.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA temp_store = MEMORY;",
        )?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

pub fn apply_migrations(conn: &Connection) -> Result<(), CoreError> {
    let current_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let mut version = current_version as usize;
    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let next_version = idx + 1;
        if next_version <= version {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", next_version))?;
        version = next_version;
    }
    Ok(())
}

impl MessageStore for SqliteStore {
    fn save(&self, conversation_id: &str, messages: &[Message]) -> Result<(), CoreError> {
        let payload = serde_json::to_string(messages)
            .map_err(|e| CoreError::Persistence(e.to_string()))?;
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.execute(
            "INSERT INTO conversation_messages (conversation_id, payload, saved_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(conversation_id) DO UPDATE SET \
                 payload = excluded.payload, \
                 saved_at = excluded.saved_at;",
            params![conversation_id, payload, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn load(&self, conversation_id: &str) -> Result<Option<Vec<Message>>, CoreError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM conversation_messages WHERE conversation_id = ?1;",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => {
                let messages = serde_json::from_str(&payload)
                    .map_err(|e| CoreError::Persistence(e.to_string()))?;
                Ok(Some(messages))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_create_schema() {
        let conn = Connection::open_in_memory().expect("memory db");
        apply_migrations(&conn).expect("migrate");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='conversation_messages';",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 1);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().expect("memory db");
        apply_migrations(&conn).expect("migrate");
        apply_migrations(&conn).expect("re-migrate");
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .expect("version");
        assert_eq!(version, MIGRATIONS.len() as i64);
    }
}
