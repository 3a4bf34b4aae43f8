use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use chrono::{Duration, Utc};
use log::info;
use crate::models::user_session::{lock_session, SessionHandle, UserSession};

#[derive(Clone)]
pub struct GlobalSessionManager {
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl GlobalSessionManager {
    pub fn new() -> Self {
        GlobalSessionManager {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Inserts or replaces a session and returns its handle
    pub fn insert(&self, session_id: String, session: UserSession) -> SessionHandle {
        let handle = session.into_handle();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session_id, Arc::clone(&handle));
        handle
    }

    /// Retrieves a session if it exists and marks it active
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let handle = {
            let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            sessions.get(session_id).cloned()
        }?;
        lock_session(&handle).touch();
        Some(handle)
    }

    /// Removes sessions idle for longer than `max_idle` and returns them.
    /// Busy sessions are kept.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<(String, SessionHandle)> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = sessions.iter()
            .filter(|(_, handle)| lock_session(handle).is_expired(now, max_idle))
            .map(|(id, _)| id.clone())
            .collect();
        let evicted: Vec<(String, SessionHandle)> = expired.into_iter()
            .filter_map(|id| sessions.remove(&id).map(|handle| (id, handle)))
            .collect();
        if !evicted.is_empty() {
            info!("Evicted {} idle sessions, {} left", evicted.len(), sessions.len());
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GlobalSessionManager {
    fn default() -> Self {
        Self::new()
    }
}
