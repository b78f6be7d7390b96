pub mod endpoint;
pub mod openai;
pub mod traits;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::services::settings::{AppSettings, Backend};

pub use endpoint::EndpointClient;
pub use openai::OpenAiClient;
pub use traits::CompletionClient;
pub use types::{messages_to_chat_messages, CompletionError};

pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Build the completion client selected by `settings`.
pub fn build_client(
    settings: &AppSettings,
    api_key: Option<String>,
) -> Result<Arc<dyn CompletionClient>> {
    let http = build_http_client(settings.request_timeout_secs)?;
    let client: Arc<dyn CompletionClient> = match settings.backend {
        Backend::Endpoint => Arc::new(EndpointClient::new(http, settings.endpoint_url.clone())),
        Backend::OpenAi => Arc::new(OpenAiClient::new(
            http,
            settings.api_base_url.clone(),
            api_key.unwrap_or_default(),
            settings.model.clone(),
        )),
    };
    tracing::debug!("Using {:?} completion backend", settings.backend);
    Ok(client)
}
