//! The session state machine
//!
//! Every mutating event writes through to the store before the in-memory
//! state shown back to the user changes. Nothing here is fatal: store and
//! gateway failures are caught at this boundary and turned into
//! user-visible state.

use palaver_core::model::{Conversation, ConversationSummary, Message};
use palaver_core::{Error, Result};
use palaver_providers::{CompletionProvider, WireMessage};
use palaver_store::{ConversationStore, CredentialStore};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::ChatSession;

/// Shown in place of the assistant turn when the gateway fails. Displayed
/// only, never persisted: the stored log records genuinely exchanged
/// content and nothing else.
pub const FALLBACK_REPLY: &str =
    "I couldn't fetch a response at the moment. Please try again later.";

/// Whether submitted credentials belong to an existing or a new account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Login,
    Signup,
}

/// Mediates between one user's in-memory chat state and the stores.
/// Anonymous until `submit_credentials` succeeds in login mode.
pub struct SessionManager {
    credentials: CredentialStore,
    conversations: ConversationStore,
    provider: Arc<dyn CompletionProvider>,
    session: Option<ChatSession>,
    last_error: Option<String>,
}

impl SessionManager {
    pub fn new(
        credentials: CredentialStore,
        conversations: ConversationStore,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            credentials,
            conversations,
            provider,
            session: None,
            last_error: None,
        }
    }

    /// Handle a login or signup form submission.
    ///
    /// Signup registers the account and leaves the session anonymous (the
    /// user logs in afterwards). Login verifies, then reconstructs history
    /// from the store and resumes the most recent conversation.
    pub async fn submit_credentials(
        &mut self,
        username: &str,
        password: &str,
        mode: CredentialMode,
    ) -> Result<()> {
        let result = self.handle_credentials(username, password, mode).await;
        self.track(result)
    }

    /// Send a chat message in the current session. Births a conversation
    /// when none is active.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let result = self.handle_send(text).await;
        self.track(result)
    }

    /// Load a past conversation from the store and make it active
    pub async fn select_conversation(&mut self, id: Uuid) -> Result<()> {
        let result = self.handle_select(id).await;
        self.track(result)
    }

    /// Delete one conversation; falls back to "no active conversation"
    /// when it was the active one
    pub async fn delete_conversation(&mut self, id: Uuid) -> Result<()> {
        let result = self.handle_delete(id).await;
        self.track(result)
    }

    /// Delete every conversation the current user owns
    pub async fn clear_all_history(&mut self) -> Result<()> {
        let result = self.handle_clear_all().await;
        self.track(result)
    }

    /// Clear the active conversation; the next message births a new one
    pub fn start_new_conversation(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset_active();
        }
        self.last_error = None;
    }

    /// Discard all in-memory state and return to anonymous. No store
    /// mutation.
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            info!(username = %session.username, "logged out");
        }
        self.last_error = None;
    }

    // --- state exposed to the presentation layer ---

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.username.as_str())
    }

    pub fn active_conversation(&self) -> Option<Uuid> {
        self.session.as_ref().and_then(|s| s.active_conversation)
    }

    /// Transcript of the active conversation, fallback turns included
    pub fn messages(&self) -> &[Message] {
        self.session.as_ref().map(|s| s.messages.as_slice()).unwrap_or(&[])
    }

    /// Conversation index, most recent first
    pub fn conversation_summaries(&self) -> &[ConversationSummary] {
        self.session
            .as_ref()
            .map(|s| s.known_conversations.as_slice())
            .unwrap_or(&[])
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The model identifier the gateway sends when a request carries none
    pub fn gateway_model(&self) -> String {
        self.provider.default_model()
    }

    // --- event handlers ---

    async fn handle_credentials(
        &mut self,
        username: &str,
        password: &str,
        mode: CredentialMode,
    ) -> Result<()> {
        match mode {
            CredentialMode::Signup => {
                self.credentials.register(username, password).await?;
                info!(username, "signup complete");
                Ok(())
            }
            CredentialMode::Login => {
                if !self.credentials.verify(username, password).await? {
                    return Err(Error::AuthenticationFailed);
                }

                let history = self.conversations.list_conversations(username).await?;
                info!(username, conversations = history.len(), "login complete");
                self.session = Some(ChatSession::begin(username, history));
                Ok(())
            }
        }
    }

    async fn handle_send(&mut self, text: &str) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(anonymous)?;

        // Conversation birth: the summary row is written through before
        // any message is appended, so the log never outlives its row.
        let conversation_id = match session.active_conversation {
            Some(id) => id,
            None => {
                let conversation = Conversation::begin(&session.username, text);
                self.conversations
                    .upsert_conversation(&conversation.summary())
                    .await?;
                let id = conversation.id;
                session.known_conversations.insert(0, conversation.summary());
                session.activate(id, Vec::new());
                info!(conversation = %id, title = %conversation.title, "new conversation");
                id
            }
        };

        // Write-through, then reflect.
        let user_message = Message::user(text);
        self.conversations
            .append_message(conversation_id, &session.username, &user_message)
            .await?;
        session.messages.push(user_message);
        session.persisted_messages += 1;

        let context: Vec<WireMessage> = session.messages.iter().map(WireMessage::from).collect();
        match self.provider.complete(context).await {
            Ok(reply) => {
                let assistant_message = Message::assistant(reply);
                self.conversations
                    .append_message(conversation_id, &session.username, &assistant_message)
                    .await?;
                session.messages.push(assistant_message);
                session.persisted_messages += 1;

                // Keep the cached summary consistent with the log.
                if let Some(summary) = session
                    .known_conversations
                    .iter_mut()
                    .find(|s| s.id == conversation_id)
                {
                    summary.message_count = session.persisted_messages as i64;
                    let refreshed = summary.clone();
                    self.conversations.upsert_conversation(&refreshed).await?;
                }
            }
            Err(e) => {
                // The user's message stays persisted; the degraded turn is
                // display-only and the summary is not refreshed (the log
                // stays authoritative).
                warn!(error = %e, "completion gateway failed, showing fallback");
                session.messages.push(Message::assistant(FALLBACK_REPLY));
            }
        }

        Ok(())
    }

    async fn handle_select(&mut self, id: Uuid) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(anonymous)?;
        if !session.known_conversations.iter().any(|s| s.id == id) {
            return Err(Error::Validation(format!("unknown conversation: {id}")));
        }

        // The store is authoritative; reload rather than trust whatever
        // copy is in memory.
        let messages = self.conversations.fetch_messages(id, &session.username).await?;
        session.activate(id, messages);
        Ok(())
    }

    async fn handle_delete(&mut self, id: Uuid) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(anonymous)?;

        self.conversations.delete_conversation(id, &session.username).await?;
        session.known_conversations.retain(|s| s.id != id);
        if session.active_conversation == Some(id) {
            session.reset_active();
        }
        Ok(())
    }

    async fn handle_clear_all(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(anonymous)?;

        self.conversations.clear_all(&session.username).await?;
        session.known_conversations.clear();
        session.reset_active();
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        result
    }
}

fn anonymous() -> Error {
    Error::Internal("no authenticated session".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_core::model::Role;
    use palaver_providers::{ProviderError, ProviderResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays a fixed script of gateway outcomes and records every
    /// context it was called with.
    struct ScriptedProvider {
        script: Mutex<VecDeque<ProviderResult<String>>>,
        calls: Mutex<Vec<Vec<WireMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ProviderResult<String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, messages: Vec<WireMessage>) -> ProviderResult<String> {
            self.calls.lock().unwrap().push(messages);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Api("script exhausted".to_string())))
        }

        fn default_model(&self) -> String {
            "scripted".to_string()
        }
    }

    struct Fixture {
        _dir: TempDir,
        manager: SessionManager,
        store: ConversationStore,
        provider: Arc<ScriptedProvider>,
    }

    async fn fixture(script: Vec<ProviderResult<String>>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.db");
        let pool = palaver_store::connect(path.to_str().unwrap()).await.unwrap();
        let provider = Arc::new(ScriptedProvider::new(script));
        let manager = SessionManager::new(
            CredentialStore::new(pool.clone()),
            ConversationStore::new(pool.clone()),
            provider.clone(),
        );
        Fixture {
            _dir: dir,
            manager,
            store: ConversationStore::new(pool),
            provider,
        }
    }

    async fn sign_in(manager: &mut SessionManager, username: &str) {
        manager
            .submit_credentials(username, "longenough1", CredentialMode::Signup)
            .await
            .unwrap();
        manager
            .submit_credentials(username, "longenough1", CredentialMode::Login)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_signup_login_first_message() {
        let mut fx = fixture(vec![Ok("Hi there".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;
        assert!(fx.manager.is_authenticated());
        assert_eq!(fx.manager.username(), Some("alice"));
        assert!(fx.manager.conversation_summaries().is_empty());

        fx.manager.send_message("Hello").await.unwrap();

        let summaries = fx.manager.conversation_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "Hello");
        assert_eq!(summaries[0].message_count, 2);

        let transcript = fx.manager.messages();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[0].content, "Hello");
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[1].content, "Hi there");

        // Durable copy agrees.
        let stored = fx.store.list_conversations("alice").await.unwrap();
        assert_eq!(stored.len(), 1);
        let contents: Vec<_> = stored[0].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Hello", "Hi there"]);
    }

    #[tokio::test]
    async fn test_gateway_model_comes_from_the_provider() {
        let fx = fixture(Vec::new()).await;
        assert_eq!(fx.manager.gateway_model(), "scripted");
    }

    #[tokio::test]
    async fn test_wrong_password_is_generic_failure() {
        let mut fx = fixture(Vec::new()).await;
        fx.manager
            .submit_credentials("alice", "longenough1", CredentialMode::Signup)
            .await
            .unwrap();

        let err = fx
            .manager
            .submit_credentials("alice", "wrongpassword", CredentialMode::Login)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
        assert!(!fx.manager.is_authenticated());
        assert_eq!(fx.manager.last_error(), Some("invalid username or password"));
    }

    #[tokio::test]
    async fn test_duplicate_signup_reported_inline() {
        let mut fx = fixture(Vec::new()).await;
        fx.manager
            .submit_credentials("alice", "longenough1", CredentialMode::Signup)
            .await
            .unwrap();
        let err = fx
            .manager
            .submit_credentials("alice", "longenough2", CredentialMode::Signup)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(_)));
    }

    #[tokio::test]
    async fn test_conversation_birth_is_idempotent_per_session() {
        let mut fx = fixture(vec![Ok("one".to_string()), Ok("two".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("first").await.unwrap();
        let born = fx.manager.active_conversation().unwrap();
        fx.manager.send_message("second").await.unwrap();

        assert_eq!(fx.manager.active_conversation(), Some(born));
        assert_eq!(fx.manager.conversation_summaries().len(), 1);
        assert_eq!(fx.store.list_conversations("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_shows_fallback_without_persisting_it() {
        let mut fx = fixture(vec![Err(ProviderError::Api("boom".to_string()))]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("Hello").await.unwrap();

        // Displayed: user turn plus the synthetic fallback.
        let transcript = fx.manager.messages();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content, FALLBACK_REPLY);

        // Stored: only the user turn.
        let id = fx.manager.active_conversation().unwrap();
        let stored = fx.store.fetch_messages(id, "alice").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "Hello");

        // A reload drops the fallback from the transcript too.
        fx.manager.select_conversation(id).await.unwrap();
        assert_eq!(fx.manager.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_gets_full_context() {
        let mut fx = fixture(vec![Ok("Hi there".to_string()), Ok("Again".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("Hello").await.unwrap();
        fx.manager.send_message("And again").await.unwrap();

        let calls = fx.provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), 1);
        // Second call carries the whole exchange so far.
        let roles: Vec<_> = calls[1].iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn test_login_resumes_most_recent_conversation() {
        let mut fx = fixture(vec![Ok("first reply".to_string()), Ok("second reply".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("older topic").await.unwrap();
        fx.manager.start_new_conversation();
        fx.manager.send_message("newer topic").await.unwrap();
        let newest = fx.manager.active_conversation().unwrap();

        fx.manager.logout();
        assert!(!fx.manager.is_authenticated());
        assert!(fx.manager.messages().is_empty());

        fx.manager
            .submit_credentials("alice", "longenough1", CredentialMode::Login)
            .await
            .unwrap();
        assert_eq!(fx.manager.active_conversation(), Some(newest));
        assert_eq!(fx.manager.conversation_summaries().len(), 2);
        assert_eq!(fx.manager.messages()[0].content, "newer topic");
    }

    #[tokio::test]
    async fn test_select_reloads_from_store() {
        let mut fx = fixture(vec![Ok("first reply".to_string()), Ok("second reply".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("older topic").await.unwrap();
        let older = fx.manager.active_conversation().unwrap();
        fx.manager.start_new_conversation();
        fx.manager.send_message("newer topic").await.unwrap();

        fx.manager.select_conversation(older).await.unwrap();
        assert_eq!(fx.manager.active_conversation(), Some(older));
        let contents: Vec<_> = fx.manager.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["older topic", "first reply"]);
    }

    #[tokio::test]
    async fn test_select_rejects_unknown_id() {
        let mut fx = fixture(Vec::new()).await;
        sign_in(&mut fx.manager, "alice").await;

        let err = fx.manager.select_conversation(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(fx.manager.last_error().is_some());
    }

    #[tokio::test]
    async fn test_deleting_active_conversation_resets_state() {
        let mut fx = fixture(vec![Ok("reply".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("Hello").await.unwrap();
        let id = fx.manager.active_conversation().unwrap();

        fx.manager.delete_conversation(id).await.unwrap();
        assert!(fx.manager.active_conversation().is_none());
        assert!(fx.manager.messages().is_empty());
        assert!(fx.manager.conversation_summaries().is_empty());
        assert!(fx.store.list_conversations("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_history_resets_everything() {
        let mut fx = fixture(vec![Ok("one".to_string()), Ok("two".to_string())]).await;
        sign_in(&mut fx.manager, "alice").await;

        fx.manager.send_message("first").await.unwrap();
        fx.manager.start_new_conversation();
        fx.manager.send_message("second").await.unwrap();

        fx.manager.clear_all_history().await.unwrap();
        assert!(fx.manager.conversation_summaries().is_empty());
        assert!(fx.manager.active_conversation().is_none());
        assert!(fx.store.list_conversations("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_of_different_users_stay_disjoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.db");
        let pool = palaver_store::connect(path.to_str().unwrap()).await.unwrap();

        let mut alice = SessionManager::new(
            CredentialStore::new(pool.clone()),
            ConversationStore::new(pool.clone()),
            Arc::new(ScriptedProvider::new(vec![Ok("for alice".to_string())])),
        );
        let mut bob = SessionManager::new(
            CredentialStore::new(pool.clone()),
            ConversationStore::new(pool.clone()),
            Arc::new(ScriptedProvider::new(Vec::new())),
        );

        sign_in(&mut alice, "alice").await;
        sign_in(&mut bob, "bob").await;
        alice.send_message("private to alice").await.unwrap();

        // bob guesses alice's conversation id; the owner-scoped delete is
        // a no-op for him.
        let alice_conv = alice.active_conversation().unwrap();
        assert!(bob.delete_conversation(alice_conv).await.is_ok());
        assert!(bob.conversation_summaries().is_empty());

        let store = ConversationStore::new(pool);
        assert_eq!(store.list_conversations("alice").await.unwrap().len(), 1);
    }
}
