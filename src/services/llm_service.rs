use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};
use ollama_rs::generation::options::GenerationOptions;
use ollama_rs::Ollama;
use crate::config::LlmConfig;
use crate::error::RagError;
use crate::models::chat_answer::ChatAnswer;

/// Everything the model gets for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub context: String,
    pub question: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: Prompt) -> Result<ChatAnswer, RagError>;
}

pub struct OllamaChat {
    ollama: Ollama,
    config: LlmConfig,
}

impl OllamaChat {
    pub fn new(ollama: Ollama, config: LlmConfig) -> Self {
        Self { ollama, config }
    }

    fn build_request(&self, prompt: Prompt) -> ChatMessageRequest {
        let conversation = vec![
            ChatMessage::system(prompt.system),
            ChatMessage::system(format!("Context from the repository:\n{}", prompt.context)),
            ChatMessage::user(prompt.question),
        ];
        let options = GenerationOptions::default()
            .temperature(self.config.temperature)
            .num_predict(self.config.max_tokens);
        ChatMessageRequest::new(self.config.model.clone(), conversation).options(options)
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn generate(&self, prompt: Prompt) -> Result<ChatAnswer, RagError> {
        let request = self.build_request(prompt);
        if self.config.stream {
            debug!("Streaming answer from {}", self.config.model);
            let stream = self.ollama.send_chat_messages_stream(request).await?;
            let fragments = stream.map(|item| {
                item.map(|response| response.message.content)
                    .map_err(|_| RagError::Llm("answer stream interrupted".to_string()))
            });
            return Ok(ChatAnswer::Stream(fragments.boxed()));
        }

        let response = self.ollama.send_chat_messages(request).await?;
        Ok(ChatAnswer::Text(response.message.content))
    }
}

/// Creates the Ollama client for the configured host.
pub fn create_ollama(host: &str, port: u16) -> Ollama {
    Ollama::new(host.to_string(), port)
}
