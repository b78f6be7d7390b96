use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Message, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("No response from the completion endpoint")]
    EmptyReply,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("{message}")]
    Upstream { status: u16, message: String },
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Transport("request timed out".to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.text.clone(),
        }
    }
}

/// Convert stored history into the list handed to a completion client.
pub fn messages_to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(ChatMessage::from).collect()
}
