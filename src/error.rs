use ollama_rs::error::OllamaError;
use crate::config::ConfigError;

/// Errors raised by the knowledge base and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Invalid source descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("No documents found for {0}")]
    EmptySource(String),

    #[error("Unsupported {kind} provider: {name}")]
    UnsupportedProvider { kind: &'static str, name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<OllamaError> for RagError {
    fn from(error: OllamaError) -> Self {
        RagError::Llm(error.to_string())
    }
}

impl From<meilisearch_sdk::errors::Error> for RagError {
    fn from(error: meilisearch_sdk::errors::Error) -> Self {
        RagError::Store(error.to_string())
    }
}

impl From<url::ParseError> for RagError {
    fn from(error: url::ParseError) -> Self {
        RagError::Loader(format!("invalid URL: {}", error))
    }
}
