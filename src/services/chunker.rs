use uuid::Uuid;
use crate::config::ChunkerConfig;
use crate::models::document::{Chunk, Document};

/// Splits documents on paragraph boundaries into chunks of at most
/// `chunk_size` characters. With an overlap, every chunk after the first is
/// prefixed by the last `chunk_overlap` characters of the previous one.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter()
            .flat_map(|doc| {
                self.split(&doc.content).into_iter().map(move |text| Chunk {
                    id: Uuid::new_v4().to_string(),
                    source: doc.source.clone(),
                    text,
                    embedding: Vec::new(),
                })
            })
            .collect()
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buf = String::new();
        let mut buf_chars = 0;

        for para in text.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }
            let para_chars = para.chars().count();

            if !buf.is_empty() && buf_chars + 2 + para_chars > self.chunk_size {
                chunks.push(std::mem::take(&mut buf));
                buf_chars = 0;
            }

            if para_chars > self.chunk_size {
                if !buf.is_empty() {
                    chunks.push(std::mem::take(&mut buf));
                    buf_chars = 0;
                }
                chunks.extend(hard_split(para, self.chunk_size).into_iter().map(str::to_string));
                continue;
            }

            if !buf.is_empty() {
                buf.push_str("\n\n");
                buf_chars += 2;
            }
            buf.push_str(para);
            buf_chars += para_chars;
        }
        if !buf.is_empty() {
            chunks.push(buf);
        }

        if self.chunk_overlap == 0 {
            return chunks;
        }
        let mut overlapped = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                overlapped.push(chunk.clone());
            } else {
                let tail = char_suffix(&chunks[i - 1], self.chunk_overlap);
                overlapped.push(format!("{}{}", tail, chunk));
            }
        }
        overlapped
    }
}

/// Cuts an oversized paragraph at line or word breaks, falling back to a
/// hard cut on a char boundary.
fn hard_split(text: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let window_end = byte_offset(remaining, max_chars);
        if window_end == remaining.len() {
            pieces.push(remaining);
            break;
        }
        let window = &remaining[..window_end];
        let split_at = window.rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .map(|pos| pos + 1)
            .unwrap_or(window_end);
        let piece = remaining[..split_at].trim_end();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        remaining = remaining[split_at..].trim_start();
    }
    pieces
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

fn char_suffix(s: &str, chars: usize) -> &str {
    let total = s.chars().count();
    if total <= chars {
        return s;
    }
    &s[byte_offset(s, total - chars)..]
}
