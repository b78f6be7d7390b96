pub const APP_NAME: &str = "Parley";

/// Key/value slot holding the serialized conversation collection.
pub const STORAGE_KEY: &str = "chatHistory";
pub const SETTINGS_KEY: &str = "app_settings";

pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/chatbot";
pub const DEFAULT_API_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. Answer clearly and concisely, \
and format any code in Markdown fenced code blocks (triple backticks for multi-line code, \
single backticks for inline code).";
