//! Chat messages and the ordered conversation they belong to.
//!
//! These types carry no presentation: the renderer turns them into terminal
//! lines and the storage adapter serializes them as-is.

use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Complete,
    Error,
    /// Placeholder waiting on the API; never persisted
    Loading,
    /// Reply being revealed word by word; never persisted
    Typing,
}

impl MessageStatus {
    pub fn is_transient(&self) -> bool {
        matches!(self, MessageStatus::Loading | MessageStatus::Typing)
    }
}

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            status: MessageStatus::Complete,
        }
    }

    pub fn loading() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            status: MessageStatus::Loading,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn get(&self, idx: usize) -> Option<&ChatMessage> {
        self.messages.get(idx)
    }

    pub fn last_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.last_mut()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in a final state, in order.
    pub fn persistable(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !m.status.is_transient())
            .cloned()
            .collect()
    }
}
