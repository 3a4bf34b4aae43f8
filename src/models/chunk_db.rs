use async_trait::async_trait;
use log::{debug, error, info};
use meilisearch_sdk::errors::ErrorCode;
use meilisearch_sdk::tasks::Task;
use meilisearch_sdk::{client::Client, indexes::Index};
use crate::error::RagError;
use crate::models::document::Chunk;
use crate::models::vector_database::ChunkStore;

const PRIMARY_KEY: &str = "id";

/// Chunk index kept in MeiliSearch. Retrieval is full-text search on the
/// question, so chunks are stored without embeddings.
#[derive(Clone)]
pub struct ChunkDB {
    client: Client,
    index: Index,
}

impl ChunkDB {
    /// Connects lazily; the index is created by MeiliSearch on first write.
    pub fn new(url: &str, api_key: Option<&str>, index_name: &str) -> Result<Self, RagError> {
        let client = Client::new(url, api_key.filter(|k| !k.is_empty()))
            .map_err(|e| RagError::Store(format!("Failed to create MeiliSearch client: {}", e)))?;
        let index = client.index(index_name);
        info!("Using MeiliSearch index {} at {}", index_name, url);
        Ok(ChunkDB { client, index })
    }
}

/// A finished task can still have failed on the server side.
fn ensure_succeeded(task: Task) -> Result<(), RagError> {
    match task {
        Task::Failed { content } => {
            error!("MeiliSearch task failed: {}", content.error);
            Err(RagError::Store(content.error.to_string()))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl ChunkStore for ChunkDB {
    async fn insert(&self, chunks: Vec<Chunk>) -> Result<(), RagError> {
        let chunks: Vec<Chunk> = chunks.into_iter()
            .map(|chunk| Chunk { embedding: Vec::new(), ..chunk })
            .collect();
        let task = self.index.add_or_update(&chunks, Some(PRIMARY_KEY))
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        ensure_succeeded(task)
    }

    async fn search(&self, query: &str, _embedding: &[f32], top_n: usize) -> Result<Vec<Chunk>, RagError> {
        let search_result = self.index.search()
            .with_query(query)
            .with_limit(top_n)
            .execute::<Chunk>()
            .await
            .map_err(|e| {
                error!("MeiliSearch query failed: {}", e);
                e
            })?;
        Ok(search_result.hits.into_iter().map(|hit| hit.result).collect())
    }

    /// Deletes the whole index. It is created again on the next insert.
    async fn clear(&self) -> Result<(), RagError> {
        let task = self.client.delete_index(&self.index.uid)
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        match task {
            Task::Failed { content } if matches!(content.error.error_code, ErrorCode::IndexNotFound) => {
                debug!("Index {} was never created", self.index.uid);
                Ok(())
            }
            task => ensure_succeeded(task),
        }
    }

    fn uses_embeddings(&self) -> bool {
        false
    }
}
