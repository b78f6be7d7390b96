use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::config::SYSTEM_INSTRUCTION;
use crate::providers::traits::CompletionClient;
use crate::providers::types::{ChatMessage, CompletionError};

/// Talks straight to an OpenAI-compatible `/chat/completions` API
/// (DeepSeek by default) instead of going through the relay endpoint.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn build_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        let mut result = vec![OpenAiMessage {
            role: "system".to_string(),
            content: Some(SYSTEM_INSTRUCTION.to_string()),
        }];
        for msg in messages {
            result.push(OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            });
        }
        result
    }

    fn build_auth_header(api_key: &str) -> Option<String> {
        if api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", api_key))
        }
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return parsed.error.message;
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: Self::build_messages(history),
            stream: false,
        };

        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request);

        if let Some(auth) = Self::build_auth_header(&self.api_key) {
            req = req.header("Authorization", auth);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                message: Self::parse_error_message(status, &body),
            });
        }

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(format!("Invalid response: {}", e)))?;

        openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyReply)
    }
}
