use crate::config::StorageConfig;
use crate::error::{BharatError, Result};
use crate::models::{preview_of, ConversationSummary, Message};
use anyhow::Context;
use chrono::{SubsecRound, Utc};
use directories::ProjectDirs;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod types;
pub use types::StoredConversation;

use types::{from_column, to_column};

const SUMMARY_COLUMNS: &str =
    "id, title, message_count, last_message_preview, created_at, updated_at";

/// Storage backend for conversations
///
/// Each conversation is one row: summary columns plus the message list as
/// JSON. A row only exists once its first exchange succeeded.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory unless
    /// `BHARAT_HISTORY_DB` points elsewhere.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("BHARAT_HISTORY_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("in", "bharat-ai", "bharat-ai")
            .ok_or_else(|| BharatError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("conversations.db"))
    }

    /// Open the database named in configuration, or the default location
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match &config.db_path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("chats.db")).unwrap();
    /// assert!(storage.list_summaries().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| BharatError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| BharatError::Storage(e.to_string()).into())
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                last_message_preview TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                messages JSON NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| BharatError::Storage(e.to_string()))?;

        Ok(())
    }

    fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationSummary> {
        let message_count: i64 = row.get(2)?;
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;
        let timestamp = |idx: usize, value: &str| {
            from_column(value).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        };
        Ok(ConversationSummary {
            id: row.get(0)?,
            title: row.get(1)?,
            message_count: message_count.max(0) as usize,
            last_message_preview: row.get(3)?,
            created_at: timestamp(4, &created_at)?,
            updated_at: timestamp(5, &updated_at)?,
        })
    }

    /// Create a conversation from its first successful exchange
    ///
    /// # Errors
    ///
    /// Returns a storage error if the row cannot be written
    pub fn create_conversation(
        &self,
        title: &str,
        user_message: &Message,
        assistant_message: &Message,
    ) -> Result<ConversationSummary> {
        let conn = self.open()?;
        let now = Utc::now().trunc_subsecs(6);
        let summary = ConversationSummary {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            message_count: 2,
            last_message_preview: preview_of(&assistant_message.content),
            created_at: now,
            updated_at: now,
        };

        let messages_json = serde_json::to_string(&[user_message, assistant_message])
            .context("Failed to serialize messages")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        conn.execute(
            "INSERT INTO conversations
                (id, title, message_count, last_message_preview, created_at, updated_at, messages)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                summary.id,
                summary.title,
                summary.message_count as i64,
                summary.last_message_preview,
                to_column(&summary.created_at),
                to_column(&summary.updated_at),
                messages_json
            ],
        )
        .context("Failed to insert conversation")
        .map_err(|e| BharatError::Storage(e.to_string()))?;

        tracing::debug!(conversation_id = %summary.id, "Created conversation");
        Ok(summary)
    }

    /// Append one user/assistant exchange to an existing conversation
    ///
    /// Bumps `message_count` by two, replaces the preview and advances
    /// `updated_at`, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` if `id` does not exist
    pub fn append_exchange(
        &self,
        id: &str,
        user_message: &Message,
        assistant_message: &Message,
    ) -> Result<ConversationSummary> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        let messages_json: Option<String> = tx
            .query_row(
                "SELECT messages FROM conversations WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query conversation")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        let messages_json =
            messages_json.ok_or_else(|| BharatError::ConversationNotFound(id.to_string()))?;

        let mut messages: Vec<Message> = serde_json::from_str(&messages_json)
            .context("Failed to deserialize messages")
            .map_err(|e| BharatError::Storage(e.to_string()))?;
        messages.push(user_message.clone());
        messages.push(assistant_message.clone());

        let updated_json = serde_json::to_string(&messages)
            .context("Failed to serialize messages")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        tx.execute(
            "UPDATE conversations SET
                message_count = ?,
                last_message_preview = ?,
                updated_at = ?,
                messages = ?
            WHERE id = ?",
            params![
                messages.len() as i64,
                preview_of(&assistant_message.content),
                to_column(&Utc::now()),
                updated_json,
                id
            ],
        )
        .context("Failed to update conversation")
        .map_err(|e| BharatError::Storage(e.to_string()))?;

        let summary = tx
            .query_row(
                &format!("SELECT {} FROM conversations WHERE id = ?", SUMMARY_COLUMNS),
                params![id],
                Self::summary_from_row,
            )
            .context("Failed to read updated conversation")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        Ok(summary)
    }

    /// Load a conversation with all of its messages
    pub fn load_conversation(&self, id: &str) -> Result<Option<StoredConversation>> {
        let conn = self.open()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {}, messages FROM conversations WHERE id = ?",
                    SUMMARY_COLUMNS
                ),
                params![id],
                |row| {
                    let summary = Self::summary_from_row(row)?;
                    let messages_json: String = row.get(6)?;
                    Ok((summary, messages_json))
                },
            )
            .optional()
            .context("Failed to query conversation")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        match row {
            Some((summary, messages_json)) => {
                let messages: Vec<Message> = serde_json::from_str(&messages_json)
                    .context("Failed to deserialize messages")
                    .map_err(|e| BharatError::Storage(e.to_string()))?;
                Ok(Some(StoredConversation { summary, messages }))
            }
            None => Ok(None),
        }
    }

    /// List conversation summaries, most recently updated first
    pub fn list_summaries(&self) -> Result<Vec<ConversationSummary>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM conversations ORDER BY updated_at DESC, created_at DESC",
                SUMMARY_COLUMNS
            ))
            .context("Failed to prepare statement")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::summary_from_row)
            .context("Failed to query conversations")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        let mut summaries = Vec::new();
        for summary in rows {
            match summary {
                Ok(s) => summaries.push(s),
                Err(e) => tracing::warn!("Skipping unreadable conversation row: {}", e),
            }
        }

        Ok(summaries)
    }

    /// Delete a conversation
    ///
    /// Returns whether a row was removed.
    pub fn delete_conversation(&self, id: &str) -> Result<bool> {
        let conn = self.open()?;

        let removed = conn
            .execute("DELETE FROM conversations WHERE id = ?", params![id])
            .context("Failed to delete conversation")
            .map_err(|e| BharatError::Storage(e.to_string()))?;

        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use serial_test::serial;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Returns both the storage and the `TempDir` so the directory outlives
    /// the test body.
    fn create_test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("conversations.db");
        let storage = SqliteStorage::new_with_path(db_path).expect("failed to create storage");
        (storage, dir)
    }

    fn exchange(question: &str, answer: &str) -> (Message, Message) {
        (
            Message::new(Role::User, question),
            Message::new(Role::Assistant, answer),
        )
    }

    #[test]
    fn test_init_creates_table() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.db_path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='conversations'",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_create_conversation_france_scenario() {
        let (storage, _dir) = create_test_storage();
        let (user, assistant) = exchange(
            "What is the capital of France?",
            "Paris is the capital of France.",
        );

        let summary = storage
            .create_conversation("Capital of France", &user, &assistant)
            .expect("create failed");

        assert_eq!(summary.message_count, 2);
        assert!(summary.last_message_preview.starts_with("Paris"));

        let loaded = storage
            .load_conversation(&summary.id)
            .expect("load failed")
            .expect("conversation exists");
        assert_eq!(loaded.summary, summary);
        assert_eq!(loaded.messages, vec![user, assistant]);
    }

    #[test]
    fn test_append_exchange_bumps_count_and_preview() {
        let (storage, _dir) = create_test_storage();
        let (u1, a1) = exchange("q1", "a1");
        let created = storage.create_conversation("T", &u1, &a1).unwrap();

        sleep(Duration::from_millis(5));
        let long_answer = "x".repeat(250);
        let (u2, a2) = exchange("q2", &long_answer);
        let updated = storage.append_exchange(&created.id, &u2, &a2).unwrap();

        assert_eq!(updated.message_count, 4);
        assert_eq!(updated.last_message_preview, "x".repeat(100));
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.title, "T");
    }

    #[test]
    fn test_append_exchange_missing_conversation() {
        let (storage, _dir) = create_test_storage();
        let (u, a) = exchange("q", "a");
        let err = storage.append_exchange("nope", &u, &a).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_list_summaries_ordered_by_updated_at() {
        let (storage, _dir) = create_test_storage();
        let (u, a) = exchange("q", "a");
        let first = storage.create_conversation("A", &u, &a).unwrap();
        sleep(Duration::from_millis(5));
        let second = storage.create_conversation("B", &u, &a).unwrap();
        sleep(Duration::from_millis(5));
        let third = storage.create_conversation("C", &u, &a).unwrap();

        let ids: Vec<_> = storage
            .list_summaries()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![third.id.clone(), second.id.clone(), first.id.clone()]);

        sleep(Duration::from_millis(5));
        storage.append_exchange(&first.id, &u, &a).unwrap();
        let ids: Vec<_> = storage
            .list_summaries()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![first.id, third.id, second.id]);
    }

    #[test]
    fn test_corrupt_timestamp_row_is_skipped_not_bumped() {
        let (storage, _dir) = create_test_storage();
        let (u, a) = exchange("q", "a");
        let good = storage.create_conversation("Good", &u, &a).unwrap();
        let bad = storage.create_conversation("Bad", &u, &a).unwrap();

        let conn = Connection::open(storage.db_path()).expect("open connection");
        conn.execute(
            "UPDATE conversations SET updated_at = 'not a time' WHERE id = ?",
            params![bad.id],
        )
        .expect("corrupt row");

        let ids: Vec<_> = storage
            .list_summaries()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![good.id]);

        let err = storage.load_conversation(&bad.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::Storage(_))
        ));
    }

    #[test]
    fn test_delete_conversation() {
        let (storage, _dir) = create_test_storage();
        let (u, a) = exchange("q", "a");
        let created = storage.create_conversation("A", &u, &a).unwrap();

        assert!(storage.delete_conversation(&created.id).unwrap());
        assert!(!storage.delete_conversation(&created.id).unwrap());
        assert!(storage.load_conversation(&created.id).unwrap().is_none());
    }

    #[test]
    #[serial]
    fn test_env_override_db_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env.db");
        std::env::set_var("BHARAT_HISTORY_DB", &path);
        let storage = SqliteStorage::new();
        std::env::remove_var("BHARAT_HISTORY_DB");

        let storage = storage.unwrap();
        assert_eq!(storage.db_path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_from_config_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cfg.db");
        let config = StorageConfig {
            db_path: Some(path.to_string_lossy().to_string()),
        };
        let storage = SqliteStorage::from_config(&config).unwrap();
        assert_eq!(storage.db_path(), path.as_path());
    }
}
