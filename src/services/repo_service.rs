use log::{error, info, warn};
use serde::Serialize;
use crate::models::user_session::{lock_session, BusyGuard, SessionHandle};
use crate::services::github_loader::Loader;
use crate::services::knowledge_base::DataType;

pub const LOAD_SUCCESS_STATUS: &str = "✅ Repository loaded successfully!";
pub const EMPTY_INPUT_WARNING: &str = "Please enter a valid GitHub repository URL";
pub const BUSY_WARNING: &str = "Still working on the previous request, please wait";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Loaded { repo: String, chunks: usize },
    Failed { message: String },
    Rejected { message: String },
}

/// Reduces a GitHub URL to `owner/repo`. Anything without `github.com` is
/// returned untouched; no further validation happens here.
pub fn parse_repo_identifier(input: &str) -> String {
    if !input.contains("github.com") {
        return input.to_string();
    }
    let parts: Vec<&str> = input.split('/').filter(|part| !part.is_empty()).collect();
    match parts.as_slice() {
        [.., owner, repo] => format!("{}/{}", owner, repo),
        [only] => only.to_string(),
        [] => String::new(),
    }
}

pub fn source_descriptor(repo: &str) -> String {
    format!("repo:{} type:repo", repo)
}

/// Loads a repository into the session's knowledge base.
///
/// On success the repository becomes the active one and the chat history is
/// cleared. On failure only the status line changes.
pub async fn ingest_repository(session: &SessionHandle, input: &str, loader: &dyn Loader) -> IngestOutcome {
    let input = input.trim();
    if input.is_empty() {
        warn!("Ignoring empty repository input");
        return IngestOutcome::Rejected {
            message: EMPTY_INPUT_WARNING.to_string(),
        };
    }

    let Some(_busy) = BusyGuard::acquire(session) else {
        warn!("Repository load requested while session is busy");
        return IngestOutcome::Rejected {
            message: BUSY_WARNING.to_string(),
        };
    };

    let repo = parse_repo_identifier(input);
    let knowledge_base = lock_session(session).knowledge_base.clone();
    info!("Adding repository {} to knowledge base...", repo);

    match knowledge_base.add(&source_descriptor(&repo), DataType::Github, loader).await {
        Ok(chunks) => {
            info!("Repository {} loaded with {} chunks", repo, chunks);
            let mut state = lock_session(session);
            state.upload_status = LOAD_SUCCESS_STATUS.to_string();
            state.repo_added = true;
            state.current_repo = repo.clone();
            state.messages.clear();
            IngestOutcome::Loaded { repo, chunks }
        }
        Err(e) => {
            error!("Failed to load repository {}: {}", repo, e);
            let message = format!("❌ Error: {}", e);
            lock_session(session).upload_status = message.clone();
            IngestOutcome::Failed { message }
        }
    }
}
