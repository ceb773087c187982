pub mod chat;
pub mod sse;

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key is required for the chat model endpoint")]
    MissingApiKey,
    #[error("Invalid API key format: {0}")]
    InvalidApiKey(String),
    #[error("Failed to reach model endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Model endpoint returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("Model endpoint reported an error: {0}")]
    Upstream(String),
    #[error("Failed to decode model response: {0}")]
    Decode(#[from] serde_json::Error),
}
