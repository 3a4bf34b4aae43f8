use async_trait::async_trait;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use crate::error::RagError;

/// Turns texts into vectors, one per input, in input order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RagError>;
}

pub struct OllamaEmbedder {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(ollama: Ollama, model: impl Into<String>) -> Self {
        Self {
            ollama,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(texts));
        let response = self.ollama.generate_embeddings(request).await
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        if response.embeddings.len() != expected {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                expected,
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}
