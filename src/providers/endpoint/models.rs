use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct RelayRequest {
    pub messages: Vec<RelayMessage>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RelayResponse {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RelayErrorResponse {
    pub error: Option<String>,
}
