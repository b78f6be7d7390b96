use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::database::KeyValueStore;
use crate::config::{
    DEFAULT_API_BASE_URL, DEFAULT_ENDPOINT_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, SETTINGS_KEY,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub backend: Backend,
    pub endpoint_url: String,
    pub api_base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Relay endpoint speaking `{messages}` / `{message}`.
    Endpoint,
    /// OpenAI-compatible chat completions API.
    OpenAi,
}

impl Backend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "endpoint" => Some(Backend::Endpoint),
            "openai" => Some(Backend::OpenAi),
            _ => None,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Endpoint,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AppSettings {
    /// Override fields from `PARLEY_*` variables as returned by `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = var("PARLEY_BACKEND") {
            self.backend = Backend::from_str(&backend)
                .with_context(|| format!("Unknown PARLEY_BACKEND value: {}", backend))?;
        }
        if let Some(endpoint) = var("PARLEY_ENDPOINT") {
            self.endpoint_url = endpoint;
        }
        if let Some(base) = var("PARLEY_API_BASE") {
            self.api_base_url = base;
        }
        if let Some(model) = var("PARLEY_MODEL") {
            self.model = model;
        }
        if let Some(timeout) = var("PARLEY_TIMEOUT_SECS") {
            self.request_timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid PARLEY_TIMEOUT_SECS value: {}", timeout))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = match self.backend {
            Backend::Endpoint => &self.endpoint_url,
            Backend::OpenAi => &self.api_base_url,
        };
        url::Url::parse(url).with_context(|| format!("Invalid completion URL: {}", url))?;
        if self.request_timeout_secs == 0 {
            bail!("Request timeout must be at least one second");
        }
        Ok(())
    }
}

/// The API key is only ever read from the environment.
pub fn api_key_from_env<F>(var: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    var("PARLEY_API_KEY")
        .or_else(|| var("DEEPSEEK_API_KEY"))
        .filter(|k| !k.trim().is_empty())
}

pub struct SettingsService;

impl SettingsService {
    pub fn load(store: &dyn KeyValueStore) -> AppSettings {
        match store.get(SETTINGS_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings: {}", e);
                AppSettings::default()
            }
        }
    }

    pub fn save(store: &dyn KeyValueStore, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        store.set(SETTINGS_KEY, &json)?;
        Ok(())
    }
}
