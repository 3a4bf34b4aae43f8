use std::fmt;
use futures::stream::BoxStream;
use futures::StreamExt;
use crate::error::RagError;

/// What the knowledge base hands back for a question: either the whole
/// reply at once or a lazy sequence of text fragments.
pub enum ChatAnswer {
    Text(String),
    Stream(BoxStream<'static, Result<String, RagError>>),
}

impl fmt::Debug for ChatAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatAnswer::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ChatAnswer::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl ChatAnswer {
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        ChatAnswer::Stream(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

/// Collapses an answer into one string, keeping fragment order.
/// A failing fragment turns the whole answer into an error notice.
pub async fn answer_text(answer: ChatAnswer) -> String {
    match answer {
        ChatAnswer::Text(text) => text,
        ChatAnswer::Stream(mut fragments) => {
            let mut text = String::new();
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(fragment) => text.push_str(&fragment),
                    Err(e) => return format!("Error processing response: {}", e),
                }
            }
            text
        }
    }
}
