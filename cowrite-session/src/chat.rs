//! Session chat log.
//!
//! Chat is accepted at the packet dispatch layer and delegated here;
//! the log is what a UI renders and what the session archive persists.

use cowrite_types::UserId;
use serde::{Deserialize, Serialize};

/// One chat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatMessage {
    /// A normal user message.
    User { from: UserId, text: String },

    /// A message from the server itself.
    Server { text: String },

    /// An emote (`/me`-style) message.
    Emote { from: UserId, text: String },
}

impl ChatMessage {
    /// The message text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            ChatMessage::User { text, .. }
            | ChatMessage::Server { text }
            | ChatMessage::Emote { text, .. } => text,
        }
    }

    /// The sending user, if any.
    #[must_use]
    pub fn from(&self) -> Option<UserId> {
        match self {
            ChatMessage::User { from, .. } | ChatMessage::Emote { from, .. } => Some(*from),
            ChatMessage::Server { .. } => None,
        }
    }
}

/// Append-only chat history.
#[derive(Debug, Default)]
pub struct Chat {
    messages: Vec<ChatMessage>,
}

impl Chat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
