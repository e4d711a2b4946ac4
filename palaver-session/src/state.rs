//! In-memory state of one authenticated session

use palaver_core::model::{Conversation, ConversationSummary, Message};
use uuid::Uuid;

/// The in-memory half of a logged-in user's session. The conversation
/// store owns the durable copy; everything here is rebuilt from it on
/// login and reload, so nothing in this struct is ever the only copy of
/// persisted content.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub username: String,
    pub active_conversation: Option<Uuid>,
    /// Transcript shown to the user. May end with a synthetic fallback
    /// turn that exists nowhere in the store.
    pub messages: Vec<Message>,
    /// Conversation index, most recent first
    pub known_conversations: Vec<ConversationSummary>,
    /// How many of `messages` are durably stored; fallback turns are
    /// displayed but never counted here.
    pub(crate) persisted_messages: usize,
}

impl ChatSession {
    /// Enter the authenticated state: index the stored history and, when
    /// it is non-empty, resume the most recent conversation.
    pub(crate) fn begin(username: impl Into<String>, history: Vec<Conversation>) -> Self {
        let mut session = Self {
            username: username.into(),
            active_conversation: None,
            messages: Vec::new(),
            known_conversations: history.iter().map(Conversation::summary).collect(),
            persisted_messages: 0,
        };

        if let Some(latest) = history.into_iter().next() {
            session.active_conversation = Some(latest.id);
            session.persisted_messages = latest.messages.len();
            session.messages = latest.messages;
        }

        session
    }

    /// Switch the transcript to `messages`, discarding what was shown
    pub(crate) fn activate(&mut self, id: Uuid, messages: Vec<Message>) {
        self.active_conversation = Some(id);
        self.persisted_messages = messages.len();
        self.messages = messages;
    }

    /// Back to "no active conversation"
    pub(crate) fn reset_active(&mut self) {
        self.active_conversation = None;
        self.messages.clear();
        self.persisted_messages = 0;
    }
}
