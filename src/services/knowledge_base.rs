use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use log::{debug, info};
use uuid::Uuid;
use crate::config::AppConfig;
use crate::error::RagError;
use crate::models::chat_answer::ChatAnswer;
use crate::models::chunk_db::ChunkDB;
use crate::models::document::format_chunks;
use crate::models::vector_database::{ChunkStore, VectorDatabase};
use crate::services::chunker::TextChunker;
use crate::services::embedding_service::{Embedder, OllamaEmbedder};
use crate::services::github_loader::Loader;
use crate::services::llm_service::{create_ollama, LanguageModel, OllamaChat, Prompt};

const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Github,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Github => write!(f, "github"),
        }
    }
}

/// The retrieval-augmented store a session chats against.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Loads `source`, indexes it and returns the number of chunks stored.
    async fn add(&self, source: &str, data_type: DataType, loader: &dyn Loader) -> Result<usize, RagError>;

    async fn chat(&self, question: &str) -> Result<ChatAnswer, RagError>;

    async fn reset(&self) -> Result<(), RagError>;
}

/// Builds a fresh knowledge base for a new session.
pub type KnowledgeBaseFactory = Arc<dyn Fn() -> Result<Arc<dyn KnowledgeBase>, RagError> + Send + Sync>;

/// Factory building a [`RagApp`] per session, each in its own collection.
pub fn config_factory(config: Arc<AppConfig>) -> KnowledgeBaseFactory {
    Arc::new(move || {
        let collection = format!("session_{}", Uuid::new_v4().simple());
        let app = RagApp::from_config(&config, &collection)?;
        Ok(Arc::new(app) as Arc<dyn KnowledgeBase>)
    })
}

pub struct RagApp {
    embedder: Box<dyn Embedder>,
    llm: Box<dyn LanguageModel>,
    store: Box<dyn ChunkStore>,
    chunker: TextChunker,
    top_k: usize,
    system_prompt: String,
}

impl RagApp {
    pub fn new(
        embedder: Box<dyn Embedder>,
        llm: Box<dyn LanguageModel>,
        store: Box<dyn ChunkStore>,
        chunker: TextChunker,
        top_k: usize,
        system_prompt: impl Into<String>,
    ) -> Self {
        RagApp {
            embedder,
            llm,
            store,
            chunker,
            top_k,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn from_config(config: &AppConfig, collection: &str) -> Result<Self, RagError> {
        config.validate()?;
        if config.llm.provider != "ollama" {
            return Err(RagError::UnsupportedProvider {
                kind: "llm",
                name: config.llm.provider.clone(),
            });
        }
        if config.embedder.provider != "ollama" {
            return Err(RagError::UnsupportedProvider {
                kind: "embedder",
                name: config.embedder.provider.clone(),
            });
        }

        let store: Box<dyn ChunkStore> = match config.vectordb.provider.as_str() {
            "memory" => match &config.vectordb.dir {
                Some(dir) => Box::new(VectorDatabase::open(dir.join(format!("{}.json", collection)))?),
                None => Box::new(VectorDatabase::new()),
            },
            "meilisearch" => Box::new(ChunkDB::new(
                &config.vectordb.url,
                config.secrets.meilisearch_key.as_deref(),
                collection,
            )?),
            other => {
                return Err(RagError::UnsupportedProvider {
                    kind: "vectordb",
                    name: other.to_string(),
                })
            }
        };

        let ollama = create_ollama(&config.ollama.host, config.ollama.port);
        debug!("Knowledge base {} uses Ollama at {}", collection, config.ollama_url());
        Ok(Self::new(
            Box::new(OllamaEmbedder::new(ollama.clone(), config.embedder.model.clone())),
            Box::new(OllamaChat::new(ollama, config.llm.clone())),
            store,
            TextChunker::from_config(&config.chunker),
            config.retrieval.top_k,
            config.llm.system_prompt.clone(),
        ))
    }

    async fn embed_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RagError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let vectors = self.embedder.embed(batch.to_vec()).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl KnowledgeBase for RagApp {
    async fn add(&self, source: &str, data_type: DataType, loader: &dyn Loader) -> Result<usize, RagError> {
        info!("Adding {} source: {}", data_type, source);
        let documents = loader.load(source).await?;
        let mut chunks = self.chunker.chunk_documents(&documents);
        if chunks.is_empty() {
            return Err(RagError::EmptySource(source.to_string()));
        }
        info!("Split {} documents into {} chunks", documents.len(), chunks.len());

        if self.store.uses_embeddings() {
            let texts = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embed_all(texts).await?;
            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        let count = chunks.len();
        self.store.insert(chunks).await?;
        Ok(count)
    }

    async fn chat(&self, question: &str) -> Result<ChatAnswer, RagError> {
        let embedding = if self.store.uses_embeddings() {
            self.embedder.embed(vec![question.to_string()]).await?
                .pop()
                .ok_or_else(|| RagError::Embedding("no embedding returned for question".to_string()))?
        } else {
            Vec::new()
        };

        let context = self.store.search(question, &embedding, self.top_k).await?;
        debug!("Retrieved {} chunks for question", context.len());

        self.llm.generate(Prompt {
            system: self.system_prompt.clone(),
            context: format_chunks(&context),
            question: question.to_string(),
        }).await
    }

    async fn reset(&self) -> Result<(), RagError> {
        info!("Dropping all stored chunks");
        self.store.clear().await
    }
}
