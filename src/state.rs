//! Observable session state.
//!
//! The session task is the only writer. View code holds a
//! [`watch::Receiver`] and re-renders whenever it changes.

use tokio::sync::watch;

use crate::types::{EmotionReading, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatEntry {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(chrono::Local::now().to_rfc3339()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Prefers the server's timestamp when it sent one.
    pub fn with_timestamp(mut self, timestamp: Option<&str>) -> Self {
        if let Some(timestamp) = timestamp {
            self.timestamp = Some(timestamp.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub connected: bool,
    pub emotion: Option<EmotionReading>,
    /// Insertion order is display order.
    pub chat: Vec<ChatEntry>,
    pub topic: Option<Topic>,
    /// The backend is analysing a finished recording.
    pub processing: bool,
    pub recording: bool,
    pub capture_enabled: bool,
    pub muted: bool,
    /// Transport or server error, cleared on every successful open.
    pub error: Option<String>,
    /// Camera / microphone failure, kept apart from transport errors.
    pub capture_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connected: false,
            emotion: None,
            chat: Vec::new(),
            topic: None,
            processing: false,
            recording: false,
            capture_enabled: true,
            muted: false,
            error: None,
            capture_error: None,
        }
    }
}

impl SessionState {
    pub fn last_entry(&self) -> Option<&ChatEntry> {
        self.chat.last()
    }
}

pub struct StateStore {
    tx: watch::Sender<SessionState>,
}

impl StateStore {
    pub fn new(initial: SessionState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Applies `mutate`; subscribers are only woken when it returns `true`.
    pub(crate) fn update<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        self.tx.send_if_modified(mutate)
    }
}
