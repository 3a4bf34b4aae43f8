use std::fmt;
use serde::{Deserialize, Serialize};

/// A file pulled from a source by a loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub content: String,
    pub repository: Option<String>,
    pub path: Option<String>,
}

/// A slice of a document as it sits in a chunk store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source: {}", self.source)?;
        write!(f, "{}", self.text)
    }
}

pub fn format_chunks(chunks: &[Chunk]) -> String {
    chunks.iter()
        .map(|chunk| chunk.to_string())
        .collect::<Vec<_>>()
        .join("\n---\n")
}
