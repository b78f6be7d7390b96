use async_trait::async_trait;

use super::types::{ChatMessage, CompletionError};

/// A remote service that turns a message history into one assistant reply.
///
/// Implementations prepend the system instruction themselves and must not
/// keep the history around after the call returns.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError>;
}
