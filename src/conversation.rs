use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One turn of conversation. Messages are appended in arrival order and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Sender::Bot, content)
    }
}

/// State owned by a single conversation: the ordered message log, the
/// current quick-reply set, and a turn counter.
///
/// The turn counter is the stale-reply guard: every user message starts a
/// new turn, and a remote reply may only be appended while the turn it was
/// requested for is still the current one.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    messages: Vec<ChatMessage>,
    suggestions: Vec<String>,
    turn: u64,
}

impl ConversationSession {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The last `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn begin_turn(&mut self) -> u64 {
        self.turn += 1;
        self.turn
    }

    pub fn current_turn(&self) -> u64 {
        self.turn
    }

    pub fn set_suggestions(&mut self, suggestions: Vec<String>) {
        self.suggestions = suggestions;
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }
}

/// Storage for per-conversation sessions, keyed by conversation id.
pub trait SessionStore: Send + Sync {
    /// Runs `f` against the session for `id`, creating it if absent.
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut ConversationSession));
    /// Clone of the current session state; a fresh session if absent.
    fn snapshot(&self, id: &str) -> ConversationSession;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut ConversationSession)) {
        let mut sessions = self.sessions.write();
        let session = sessions.entry(id.to_string()).or_default();
        f(session);
    }

    fn snapshot(&self, id: &str) -> ConversationSession {
        self.sessions.read().get(id).cloned().unwrap_or_default()
    }
}
