use chrono::Duration;
use log::{info, warn};
use crate::models::global_session_manager::GlobalSessionManager;
use crate::models::user_session::lock_session;

/// Drops idle sessions and wipes their knowledge bases. Returns how many went.
pub async fn evict_idle_sessions(manager: &GlobalSessionManager, max_idle: Duration) -> usize {
    let evicted = manager.evict_idle(max_idle);
    for (session_id, handle) in &evicted {
        let knowledge_base = lock_session(handle).knowledge_base.clone();
        match knowledge_base.reset().await {
            Ok(()) => info!("Released knowledge base of session {}", session_id),
            Err(e) => warn!("Failed to release knowledge base of session {}: {}", session_id, e),
        }
    }
    evicted.len()
}
