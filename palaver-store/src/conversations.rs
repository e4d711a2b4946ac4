//! Conversation summaries and the append-only message log
//!
//! The summary row and the log are written independently: `upsert_conversation`
//! refreshes cached display fields only and never moves messages, while
//! `append_message` grows the log one row at a time. On a full load the log
//! wins; summaries are reconciled from it.

use crate::storage_error;
use chrono::{DateTime, Utc};
use palaver_core::model::{Conversation, ConversationSummary, Message, Role};
use palaver_core::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All of `owner`'s conversations, most recent first, each hydrated
    /// with its full ordered message list. Used on login to reconstruct
    /// history.
    pub async fn list_conversations(&self, owner: &str) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, owner_username, title, created_at \
             FROM conversations WHERE owner_username = ? \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let id = parse_uuid(&row.get::<String, _>("id"))?;
            let messages = self.fetch_messages(id, owner).await?;
            conversations.push(Conversation {
                id,
                owner: row.get("owner_username"),
                title: row.get("title"),
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
                messages,
            });
        }

        debug!(owner, count = conversations.len(), "loaded conversation history");
        Ok(conversations)
    }

    /// The ordered message log of one conversation. Ordering is timestamp
    /// ascending with insertion order breaking ties.
    pub async fn fetch_messages(&self, conversation_id: Uuid, owner: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM chat_history \
             WHERE conversation_id = ? AND owner_username = ? \
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(Message {
                    role: row.get::<String, _>("role").parse::<Role>()?,
                    content: row.get("content"),
                    timestamp: row.get::<DateTime<Utc>, _>("timestamp"),
                })
            })
            .collect()
    }

    /// Create the summary row if the id is new; otherwise refresh the
    /// cached fields (title, message count). Never touches the log, and
    /// never flips a row to another owner.
    pub async fn upsert_conversation(&self, summary: &ConversationSummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO conversations (id, owner_username, title, created_at, message_count) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               title = excluded.title, \
               message_count = excluded.message_count \
             WHERE conversations.owner_username = excluded.owner_username",
        )
        .bind(summary.id.to_string())
        .bind(&summary.owner)
        .bind(&summary.title)
        .bind(summary.created_at)
        .bind(summary.message_count)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    /// Append one message to the durable log. The conversation row must
    /// already exist (the summary is written through before the first
    /// append).
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        owner: &str,
        message: &Message,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_history (conversation_id, owner_username, role, content, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(conversation_id.to_string())
        .bind(owner)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    /// Delete a conversation and, via cascade, its messages. A no-op when
    /// the id does not exist or belongs to someone else.
    pub async fn delete_conversation(&self, id: Uuid, owner: &str) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM conversations WHERE id = ? AND owner_username = ?",
        )
        .bind(id.to_string())
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(%id, owner, deleted = result.rows_affected(), "delete conversation");
        Ok(())
    }

    /// Delete every conversation `owner` has, messages included.
    pub async fn clear_all(&self, owner: &str) -> Result<()> {
        sqlx::query("DELETE FROM conversations WHERE owner_username = ?")
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Serialization(format!("bad conversation id: {e}")))
}
