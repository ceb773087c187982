pub mod upstream;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Service URL index {index} is out of range (0..{available})")]
    InvalidServiceIndex {
        index: usize,
        available: usize,
    },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("No API key configured for the model endpoint (set OPENAI_API_KEY or --chat-api-key)")]
    MissingApiKey,
}
