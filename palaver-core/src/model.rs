//! Typed records for users, conversations and messages
//!
//! Rows are never passed around as loose key-value maps; everything that
//! crosses the store boundary is one of these structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of characters of the first user message used as a conversation
/// title. A display label only; never reparsed.
pub const TITLE_PREFIX_CHARS: usize = 30;

/// Who authored a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(crate::Error::Serialization(format!(
                "unknown message role: {other}"
            ))),
        }
    }
}

/// One turn in a conversation. Immutable once stored: no edits, no
/// retraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A registered user. Created at signup, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// One-way digest of the password; the plaintext is never stored.
    pub password_digest: String,
}

/// The cached display fields of a conversation row, distinct from the
/// authoritative append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub message_count: i64,
}

/// A titled, ordered thread of messages owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation titled after the triggering message
    pub fn begin(owner: impl Into<String>, first_message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            title: derive_title(first_message),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            owner: self.owner.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            message_count: self.messages.len() as i64,
        }
    }
}

/// Derive a conversation title: exactly the first [`TITLE_PREFIX_CHARS`]
/// characters of the triggering message, not word-boundary aware.
pub fn derive_title(first_message: &str) -> String {
    first_message.chars().take(TITLE_PREFIX_CHARS).collect()
}
