//! SQLite-backed store for conversations and their messages.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ids::{ConversationId, MessageId};
use crate::domain::sender::Sender;
use crate::storage::types::{Conversation, StoredMessage};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for conversation and message persistence.
///
/// Every write is committed before the returned future resolves.
pub trait ConversationStore: Send + Sync {
    /// Create a conversation with a server-assigned id and the current time.
    ///
    /// # Errors
    /// Returns an error if the topic is blank or storage access fails.
    fn create_conversation(&self, topic: &str) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Append one message to an existing conversation.
    ///
    /// # Errors
    /// Returns [`StoreError::ConversationNotFound`] for an unknown conversation.
    fn append_message(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        body: &str,
    ) -> StoreFuture<'_, StoreResult<StoredMessage>>;

    /// Append a user message and the bot reply to it as one unit: both rows
    /// are written or neither is.
    ///
    /// # Errors
    /// Returns [`StoreError::ConversationNotFound`] for an unknown conversation.
    fn append_exchange(
        &self,
        conversation_id: ConversationId,
        user_body: &str,
        bot_body: &str,
    ) -> StoreFuture<'_, StoreResult<()>>;

    /// Delete a conversation and every message it owns.
    ///
    /// Returns `false` when nothing matched; deleting an unknown id is not an error.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_conversation(&self, conversation_id: ConversationId)
    -> StoreFuture<'_, StoreResult<bool>>;

    /// List conversations, most recently created first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_conversations(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>>;

    /// List the messages of a conversation, oldest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StoreResult<Vec<StoredMessage>>>;

    /// Get a conversation by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StoreResult<Option<Conversation>>>;

    /// Resolve a topic to a conversation. With duplicate topics the most
    /// recently created one wins.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_by_topic(&self, topic: &str) -> StoreFuture<'_, StoreResult<Option<Conversation>>>;
}

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        topic TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_conversations_created
        ON conversations (created_at DESC);
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER NOT NULL
            REFERENCES conversations (id) ON DELETE CASCADE,
        created_at INTEGER NOT NULL,
        sender TEXT NOT NULL,
        body TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages (conversation_id, created_at, id);";

type ConversationRow = (i64, String, i64);
type MessageRow = (i64, i64, i64, String, String);

/// `SQLite` implementation of the conversation store.
///
/// The connection is owned by the store; each operation runs as one scoped
/// unit on the connection's worker thread, so writes are serialized.
pub struct SqliteConversationStore {
    conn: Connection,
}

impl SqliteConversationStore {
    /// Open (or create) the database file and ensure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening conversation database at {}", path.display());
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StoreResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn create_conversation(&self, topic: &str) -> StoreFuture<'_, StoreResult<Conversation>> {
        let topic = topic.trim().to_string();
        Box::pin(async move {
            if topic.is_empty() {
                return Err(StoreError::InvalidInput(
                    "topic must not be empty".to_string(),
                ));
            }

            let now_ms = Utc::now().timestamp_millis();
            let stored_topic = topic.clone();
            let id = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO conversations (topic, created_at) VALUES (?1, ?2)",
                        rusqlite::params![stored_topic, now_ms],
                    )?;
                    Ok(conn.last_insert_rowid())
                })
                .await?;

            Ok(Conversation {
                id: ConversationId(id),
                topic,
                created_at: timestamp_from_millis(now_ms)?,
            })
        })
    }

    fn append_message(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        body: &str,
    ) -> StoreFuture<'_, StoreResult<StoredMessage>> {
        let body = body.to_string();
        Box::pin(async move {
            let now_ms = Utc::now().timestamp_millis();
            let stored_body = body.clone();
            let inserted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    if !conversation_exists(&tx, conversation_id)? {
                        return Ok(None);
                    }
                    tx.execute(
                        "INSERT INTO messages (conversation_id, created_at, sender, body)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![conversation_id, now_ms, sender.as_str(), stored_body],
                    )?;
                    let id = tx.last_insert_rowid();
                    tx.commit()?;
                    Ok(Some(id))
                })
                .await?;

            let id = inserted.ok_or(StoreError::ConversationNotFound(conversation_id))?;
            Ok(StoredMessage {
                id: MessageId(id),
                conversation_id,
                created_at: timestamp_from_millis(now_ms)?,
                sender,
                body,
            })
        })
    }

    fn append_exchange(
        &self,
        conversation_id: ConversationId,
        user_body: &str,
        bot_body: &str,
    ) -> StoreFuture<'_, StoreResult<()>> {
        let user_body = user_body.to_string();
        let bot_body = bot_body.to_string();
        Box::pin(async move {
            let now_ms = Utc::now().timestamp_millis();
            let written = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    if !conversation_exists(&tx, conversation_id)? {
                        return Ok(false);
                    }
                    {
                        let mut stmt = tx.prepare(
                            "INSERT INTO messages (conversation_id, created_at, sender, body)
                             VALUES (?1, ?2, ?3, ?4)",
                        )?;
                        stmt.execute(rusqlite::params![
                            conversation_id,
                            now_ms,
                            Sender::User.as_str(),
                            user_body
                        ])?;
                        stmt.execute(rusqlite::params![
                            conversation_id,
                            now_ms,
                            Sender::Bot.as_str(),
                            bot_body
                        ])?;
                    }
                    tx.commit()?;
                    Ok(true)
                })
                .await?;

            if written {
                Ok(())
            } else {
                Err(StoreError::ConversationNotFound(conversation_id))
            }
        })
    }

    fn delete_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let deleted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        "DELETE FROM messages WHERE conversation_id = ?1",
                        rusqlite::params![conversation_id],
                    )?;
                    let rows = tx.execute(
                        "DELETE FROM conversations WHERE id = ?1",
                        rusqlite::params![conversation_id],
                    )?;
                    tx.commit()?;
                    Ok(rows > 0)
                })
                .await?;
            Ok(deleted)
        })
    }

    fn list_conversations(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(|conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, topic, created_at
                         FROM conversations
                         ORDER BY created_at DESC, id DESC",
                    )?;
                    let rows = stmt
                        .query_map([], read_conversation_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(conversation_from_row).collect()
        })
    }

    fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StoreResult<Vec<StoredMessage>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, created_at, sender, body
                         FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY created_at ASC, id ASC",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![conversation_id], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(message_from_row).collect()
        })
    }

    fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, topic, created_at FROM conversations WHERE id = ?1",
                            rusqlite::params![conversation_id],
                            read_conversation_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(conversation_from_row).transpose()
        })
    }

    fn find_by_topic(&self, topic: &str) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
        let topic = topic.trim().to_string();
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, topic, created_at
                             FROM conversations
                             WHERE topic = ?1
                             ORDER BY created_at DESC, id DESC
                             LIMIT 1",
                            rusqlite::params![topic],
                            read_conversation_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(conversation_from_row).transpose()
        })
    }
}

fn conversation_exists(
    tx: &rusqlite::Transaction<'_>,
    conversation_id: ConversationId,
) -> rusqlite::Result<bool> {
    tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
        rusqlite::params![conversation_id],
        |row| row.get(0),
    )
}

fn read_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn conversation_from_row((id, topic, ts): ConversationRow) -> StoreResult<Conversation> {
    Ok(Conversation {
        id: ConversationId(id),
        topic,
        created_at: timestamp_from_millis(ts)?,
    })
}

fn message_from_row(
    (id, conversation_id, ts, sender, body): MessageRow,
) -> StoreResult<StoredMessage> {
    let sender = sender
        .parse::<Sender>()
        .map_err(|value| StoreError::InvalidRow(format!("unknown sender: {value}")))?;
    Ok(StoredMessage {
        id: MessageId(id),
        conversation_id: ConversationId(conversation_id),
        created_at: timestamp_from_millis(ts)?,
        sender,
        body,
    })
}

fn timestamp_from_millis(ts: i64) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| StoreError::InvalidRow(format!("invalid timestamp: {ts}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn store() -> SqliteConversationStore {
        SqliteConversationStore::open_in_memory()
            .await
            .expect("in-memory store")
    }

    fn pairs(messages: &[StoredMessage]) -> Vec<(Sender, &str)> {
        messages
            .iter()
            .map(|m| (m.sender, m.body.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let store = store().await;
        let created = store.create_conversation("Trip Planning").await.unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(listed[0].topic, "Trip Planning");

        let messages = store.list_messages(created.id).await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let store = store().await;
        let result = store.create_conversation("   ").await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_messages_keep_append_order() {
        let store = store().await;
        let c = store.create_conversation("greetings").await.unwrap();

        store.append_message(c.id, Sender::User, "hi").await.unwrap();
        store.append_message(c.id, Sender::Bot, "hello").await.unwrap();

        let messages = store.list_messages(c.id).await.unwrap();
        assert_eq!(
            pairs(&messages),
            vec![(Sender::User, "hi"), (Sender::Bot, "hello")]
        );
        assert!(messages.iter().all(|m| m.conversation_id == c.id));
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_fails() {
        let store = store().await;
        let missing = ConversationId(99);

        let single = store.append_message(missing, Sender::User, "hi").await;
        assert!(matches!(single, Err(StoreError::ConversationNotFound(id)) if id == missing));

        let pair = store.append_exchange(missing, "hi", "hello").await;
        assert!(matches!(pair, Err(StoreError::ConversationNotFound(_))));
        assert!(store.list_messages(missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_is_stored_user_first() {
        let store = store().await;
        let c = store.create_conversation("pair").await.unwrap();

        store.append_exchange(c.id, "question", "answer").await.unwrap();
        store.append_exchange(c.id, "again", "sure").await.unwrap();

        let messages = store.list_messages(c.id).await.unwrap();
        assert_eq!(
            pairs(&messages),
            vec![
                (Sender::User, "question"),
                (Sender::Bot, "answer"),
                (Sender::User, "again"),
                (Sender::Bot, "sure"),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_and_is_isolated() {
        let store = store().await;
        let doomed = store.create_conversation("doomed").await.unwrap();
        let kept = store.create_conversation("kept").await.unwrap();
        store.append_exchange(doomed.id, "a", "b").await.unwrap();
        store.append_exchange(kept.id, "c", "d").await.unwrap();

        assert!(store.delete_conversation(doomed.id).await.unwrap());

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed, vec![kept.clone()]);
        assert!(store.list_messages(doomed.id).await.unwrap().is_empty());
        assert_eq!(store.list_messages(kept.id).await.unwrap().len(), 2);

        // Idempotent.
        assert!(!store.delete_conversation(doomed.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = store().await;
        let first = store.create_conversation("first").await.unwrap();
        let second = store.create_conversation("second").await.unwrap();
        let third = store.create_conversation("third").await.unwrap();

        let ids: Vec<_> = store
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_find_by_topic_prefers_latest_duplicate() {
        let store = store().await;
        let _older = store.create_conversation("dup").await.unwrap();
        let newer = store.create_conversation("dup").await.unwrap();

        let found = store.find_by_topic("dup").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(newer.id));
        assert!(store.find_by_topic("absent").await.unwrap().is_none());
        assert_eq!(
            store.get_conversation(newer.id).await.unwrap(),
            Some(newer)
        );
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "chatdesk-store-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let id = {
            let store = SqliteConversationStore::open(&path).await.unwrap();
            let c = store.create_conversation("persisted").await.unwrap();
            store.append_exchange(c.id, "ping", "pong").await.unwrap();
            c.id
        };

        let reopened = SqliteConversationStore::open(&path).await.unwrap();
        let messages = reopened.list_messages(id).await.unwrap();
        assert_eq!(
            pairs(&messages),
            vec![(Sender::User, "ping"), (Sender::Bot, "pong")]
        );

        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }
}
