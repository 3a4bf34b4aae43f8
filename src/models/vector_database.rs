use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use async_trait::async_trait;
use log::{debug, info};
use crate::error::RagError;
use crate::models::document::Chunk;

/// Storage and retrieval of chunks for one knowledge base.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn insert(&self, chunks: Vec<Chunk>) -> Result<(), RagError>;

    /// Returns at most `top_n` chunks, best match first.
    async fn search(&self, query: &str, embedding: &[f32], top_n: usize) -> Result<Vec<Chunk>, RagError>;

    async fn clear(&self) -> Result<(), RagError>;

    /// Whether chunks and queries must be embedded before reaching the store.
    fn uses_embeddings(&self) -> bool;
}

/// In-process store ranking chunks by cosine similarity.
pub struct VectorDatabase {
    documents: RwLock<Vec<Chunk>>,
    snapshot: Option<PathBuf>,
}

impl VectorDatabase {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            snapshot: None,
        }
    }

    /// Opens a store persisted at `snapshot`, loading it if the file exists.
    pub fn open(snapshot: PathBuf) -> Result<Self, RagError> {
        let documents = if snapshot.exists() {
            let contents = fs::read_to_string(&snapshot)?;
            let documents: Vec<Chunk> = serde_json::from_str(&contents)?;
            info!("Loaded {} chunks from {}", documents.len(), snapshot.display());
            documents
        } else {
            Vec::new()
        };
        Ok(Self {
            documents: RwLock::new(documents),
            snapshot: Some(snapshot),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialized store contents, when a snapshot is configured.
    fn snapshot_contents(&self, documents: &[Chunk]) -> Result<Option<(PathBuf, String)>, RagError> {
        match &self.snapshot {
            Some(path) => Ok(Some((path.clone(), serde_json::to_string(documents)?))),
            None => Ok(None),
        }
    }
}

impl Default for VectorDatabase {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, RagError>
where
    F: FnOnce() -> Result<T, RagError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| RagError::Store(format!("snapshot task failed: {}", e)))?
}

fn write_snapshot(path: &Path, contents: &str) -> Result<(), RagError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    debug!("Wrote snapshot {}", path.display());
    Ok(())
}

fn remove_snapshot(path: &Path) -> Result<(), RagError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed snapshot {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ChunkStore for VectorDatabase {
    async fn insert(&self, chunks: Vec<Chunk>) -> Result<(), RagError> {
        let pending = {
            let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
            documents.extend(chunks);
            self.snapshot_contents(&documents)?
        };
        if let Some((path, contents)) = pending {
            run_blocking(move || write_snapshot(&path, &contents)).await?;
        }
        Ok(())
    }

    async fn search(&self, _query: &str, embedding: &[f32], top_n: usize) -> Result<Vec<Chunk>, RagError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        let mut results: Vec<(&Chunk, f32)> = documents.iter()
            .map(|doc| (doc, cosine_similarity(&doc.embedding, embedding)))
            .collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(results.into_iter().take(top_n).map(|(doc, _)| doc.clone()).collect())
    }

    async fn clear(&self) -> Result<(), RagError> {
        {
            let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
            documents.clear();
            documents.shrink_to_fit();
        }
        if let Some(path) = self.snapshot.clone() {
            run_blocking(move || remove_snapshot(&path)).await?;
        }
        Ok(())
    }

    fn uses_embeddings(&self) -> bool {
        true
    }
}

/// Zero when either vector is empty, zero-length, or the sizes differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
