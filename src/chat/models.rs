//! The core models for a streamed chat with the reader backend.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Who the chat is about: the whole corpus of stories or a single
/// article.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChatTarget {
    #[default]
    Global,
    Article(i64),
}

impl ChatTarget {
    pub fn article_id(&self) -> Option<i64> {
        match self {
            ChatTarget::Global => None,
            ChatTarget::Article(id) => Some(*id),
        }
    }
}

/// Events framed out of a chat response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    ConversationAssigned(String),
    ErrorSignaled(String),
    Done,
}

/// The externally observable state of a chat session. Each published
/// value is a complete, independent copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub is_loading: bool,
}
