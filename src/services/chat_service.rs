use std::sync::Arc;
use async_stream::stream;
use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use crate::error::RagError;
use crate::models::chat_answer::{answer_text, ChatAnswer};
use crate::models::message::Message;
use crate::models::user_session::{lock_session, BusyGuard, SessionHandle};
use crate::services::knowledge_base::KnowledgeBase;

pub const THINKING_PLACEHOLDER: &str = "Thinking...";
pub const NO_REPOSITORY_MESSAGE: &str = "Load a repository before asking questions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "text", rename_all = "snake_case")]
pub enum ChatOutcome {
    Answered(String),
    /// Another request is in flight; carries the placeholder shown instead of an answer.
    Busy(String),
    NoRepository(String),
    Failed(String),
}

impl ChatOutcome {
    pub fn text(&self) -> &str {
        match self {
            ChatOutcome::Answered(text)
            | ChatOutcome::Busy(text)
            | ChatOutcome::NoRepository(text)
            | ChatOutcome::Failed(text) => text,
        }
    }
}

/// A question that passed the session checks. The session stays busy until
/// this is recorded or dropped.
pub struct PendingChat {
    session: SessionHandle,
    question: String,
    knowledge_base: Arc<dyn KnowledgeBase>,
    _busy: BusyGuard,
}

impl PendingChat {
    pub async fn ask(&self) -> Result<ChatAnswer, RagError> {
        self.knowledge_base.chat(&self.question).await
    }

    /// Appends the question and its answer, in that order.
    pub fn record(self, answer: &str) {
        let mut state = lock_session(&self.session);
        state.messages.push(Message::user(self.question.as_str()));
        state.messages.push(Message::assistant(answer));
    }
}

/// Checks that a repository is loaded and the session is idle, then marks it
/// busy, all under one lock.
pub fn accept_question(session: &SessionHandle, question: &str) -> Result<PendingChat, ChatOutcome> {
    let mut state = lock_session(session);
    if !state.repo_added {
        return Err(ChatOutcome::NoRepository(NO_REPOSITORY_MESSAGE.to_string()));
    }
    let Some(busy) = BusyGuard::acquire_locked(session, &mut state) else {
        warn!("Question received while session is busy");
        return Err(ChatOutcome::Busy(THINKING_PLACEHOLDER.to_string()));
    };

    Ok(PendingChat {
        session: Arc::clone(session),
        question: question.to_string(),
        knowledge_base: state.knowledge_base.clone(),
        _busy: busy,
    })
}

/// Answers one question against the active repository.
pub async fn dispatch_chat(session: &SessionHandle, question: &str) -> ChatOutcome {
    let pending = match accept_question(session, question) {
        Ok(pending) => pending,
        Err(outcome) => return outcome,
    };
    info!("Processing question: {}", question);

    match pending.ask().await {
        Ok(answer) => {
            let answer = answer_text(answer).await;
            debug!("Answer: {}", answer);
            pending.record(&answer);
            ChatOutcome::Answered(answer)
        }
        Err(e) => {
            error!("Chat failed: {}", e);
            ChatOutcome::Failed(format!("Error: {}", e))
        }
    }
}

/// Yields the answer fragment by fragment and records the full text once the
/// answer is complete. Dropping the stream early releases the session
/// without recording anything.
pub fn stream_answer(pending: PendingChat, answer: ChatAnswer) -> impl Stream<Item = String> + Send + 'static {
    stream! {
        let full = match answer {
            ChatAnswer::Text(text) => {
                yield text.clone();
                text
            }
            ChatAnswer::Stream(mut fragments) => {
                let mut full = String::new();
                let mut failure = None;
                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(fragment) => {
                            full.push_str(&fragment);
                            yield fragment;
                        }
                        Err(e) => {
                            failure = Some(format!("Error processing response: {}", e));
                            break;
                        }
                    }
                }
                match failure {
                    Some(notice) => {
                        error!("Answer stream failed: {}", notice);
                        yield format!("\n{}", notice);
                        notice
                    }
                    None => full,
                }
            }
        };
        pending.record(&full);
    }
}

/// Clears the chat history only.
pub fn reset_chat(session: &SessionHandle) {
    let mut state = lock_session(session);
    state.messages.clear();
    state.messages.shrink_to_fit();
    info!("Chat history reset");
}

/// Forgets the active repository along with the chat history and status, and
/// drops its chunks from the knowledge base.
pub async fn clear_repository(session: &SessionHandle) -> Result<(), RagError> {
    let knowledge_base = {
        let mut state = lock_session(session);
        state.repo_added = false;
        state.current_repo.clear();
        state.messages.clear();
        state.messages.shrink_to_fit();
        state.upload_status.clear();
        state.knowledge_base.clone()
    };
    info!("Repository cleared");
    knowledge_base.reset().await
}
