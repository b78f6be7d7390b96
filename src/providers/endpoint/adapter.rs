use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::config::SYSTEM_INSTRUCTION;
use crate::providers::traits::CompletionClient;
use crate::providers::types::{ChatMessage, CompletionError};

const FALLBACK_ERROR: &str = "Failed to fetch data";

/// Client for the relay endpoint that accepts `{messages}` and answers with
/// `{message}` or `{error}`.
pub struct EndpointClient {
    client: Client,
    endpoint: String,
}

impl EndpointClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn build_messages(messages: &[ChatMessage]) -> Vec<RelayMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);
        result.push(RelayMessage {
            role: "system".to_string(),
            content: SYSTEM_INSTRUCTION.to_string(),
        });
        result.extend(messages.iter().map(|m| RelayMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));
        result
    }

    fn parse_error_message(body: &str) -> String {
        serde_json::from_str::<RelayErrorResponse>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| FALLBACK_ERROR.to_string())
    }
}

#[async_trait]
impl CompletionClient for EndpointClient {
    async fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = RelayRequest {
            messages: Self::build_messages(history),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                message: Self::parse_error_message(&body),
            });
        }

        let reply: RelayResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(format!("Invalid response: {}", e)))?;

        match reply.message {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(CompletionError::EmptyReply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn history() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: Role::User,
            content: "Hi".to_string(),
        }]
    }

    fn client_for(server: &MockServer) -> EndpointClient {
        EndpointClient::new(Client::new(), format!("{}/api/chatbot", server.uri()))
    }

    #[test]
    fn test_system_instruction_comes_first() {
        let messages = EndpointClient::build_messages(&history());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "Hi");
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot"))
            .and(body_json(json!({
                "messages": [
                    { "role": "system", "content": SYSTEM_INSTRUCTION },
                    { "role": "user", "content": "Hi" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Hello!" })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server).complete(&history()).await.unwrap();
        assert_eq!(reply, "Hello!");
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "overloaded" })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&history()).await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Upstream {
                status: 500,
                message: "overloaded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_upstream_error_without_body_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&history()).await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Upstream {
                status: 502,
                message: FALLBACK_ERROR.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_message_is_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "" })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&history()).await.unwrap_err();
        assert_eq!(err, CompletionError::EmptyReply);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Reserve a free port, then release it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let endpoint = format!("http://{}/api/chatbot", addr);

        let client = EndpointClient::new(Client::new(), endpoint);
        let err = client.complete(&history()).await.unwrap_err();
        assert!(
            matches!(err, CompletionError::Transport(_)),
            "expected transport error, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "message": "too late" }))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let client = EndpointClient::new(http, format!("{}/api/chatbot", server.uri()));
        let err = client.complete(&history()).await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Transport("request timed out".to_string())
        );
    }
}
