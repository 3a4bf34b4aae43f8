use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use crate::models::message::Message;
use crate::services::knowledge_base::KnowledgeBase;

/// Shared handle to one user's session state.
pub type SessionHandle = Arc<Mutex<UserSession>>;

pub struct UserSession {
    pub messages: Vec<Message>,
    /// Empty while no repository is loaded.
    pub current_repo: String,
    pub repo_added: bool,
    pub processing: bool,
    pub upload_status: String,
    pub knowledge_base: Arc<dyn KnowledgeBase>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Serializable view of a session for the page.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub current_repo: String,
    pub repo_added: bool,
    pub processing: bool,
    pub upload_status: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        let now = Utc::now();
        UserSession {
            messages: Vec::new(),
            current_repo: String::new(),
            repo_added: false,
            processing: false,
            upload_status: String::new(),
            knowledge_base,
            created_at: now,
            last_active: now,
        }
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_repo: self.current_repo.clone(),
            repo_added: self.repo_added,
            processing: self.processing,
            upload_status: self.upload_status.clone(),
            messages: self.messages.clone(),
            created_at: self.created_at,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// Idle sessions that are not busy can be dropped.
    pub fn is_expired(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        !self.processing && now - self.last_active > max_idle
    }
}

/// Locks a session, recovering the state if a previous holder panicked.
pub fn lock_session(session: &SessionHandle) -> MutexGuard<'_, UserSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the session's busy flag. The flag is cleared when the guard drops,
/// whichever way the operation ended.
pub struct BusyGuard {
    session: SessionHandle,
}

impl BusyGuard {
    /// Marks the session busy. Returns `None` if it already was.
    pub fn acquire(session: &SessionHandle) -> Option<Self> {
        let mut state = lock_session(session);
        Self::acquire_locked(session, &mut state)
    }

    /// Same as [`BusyGuard::acquire`] for a caller already holding the lock,
    /// so other checks can happen under the same guard.
    pub fn acquire_locked(session: &SessionHandle, state: &mut UserSession) -> Option<Self> {
        if state.processing {
            return None;
        }
        state.processing = true;
        Some(BusyGuard {
            session: Arc::clone(session),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        lock_session(&self.session).processing = false;
    }
}
