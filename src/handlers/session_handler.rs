use actix_session::Session;
use actix_web::{web, HttpResponse};
use uuid::Uuid;
use log::{info, warn, error};
use serde_json::json;
use crate::error::RagError;
use crate::routes::app_state::AppState;
use crate::models::user_session::{lock_session, SessionHandle, UserSession};

const SESSION_KEY: &str = "session_id";

/// Finds the caller's session from the cookie, falling back to an id sent in the body.
pub fn resolve_session(
    data: &AppState,
    session: &Session,
    body_session_id: Option<&str>,
) -> Option<(String, SessionHandle)> {
    let session_id = match session.get::<String>(SESSION_KEY) {
        Ok(Some(id)) => id,
        _ => {
            warn!("No valid session_id found in cookie; falling back to request body");
            body_session_id.unwrap_or_default().to_string()
        }
    };

    match data.session_manager.get(&session_id) {
        Some(handle) => Some((session_id, handle)),
        None => {
            error!("Session \"{}\" not found!", session_id);
            None
        }
    }
}

pub fn session_not_initialized() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({"error": "Session not initialized"}))
}

/// Reuses the cookie's session when it is still alive, otherwise starts a new one
/// with its own knowledge base.
pub async fn initialize_session(
    data: web::Data<AppState>,
    session: Session,
) -> Result<serde_json::Value, RagError> {
    if let Ok(Some(existing)) = session.get::<String>(SESSION_KEY) {
        if data.session_manager.get(&existing).is_some() {
            info!("Reusing session {}", existing);
            return Ok(json!({ "initialized": true, "session_id": existing }));
        }
    }

    let session_id = Uuid::new_v4().to_string();
    if let Err(e) = session.insert(SESSION_KEY, session_id.clone()) {
        error!("Failed to insert session_id into cookie: {:?}", e);
    } else {
        info!("Stored session_id {} in cookie", session_id);
    }

    let knowledge_base = (data.knowledge_base_factory)()?;
    data.session_manager.insert(session_id.clone(), UserSession::new(knowledge_base));
    info!("Initialized user session: {} ({} active)", session_id, data.session_manager.len());

    Ok(json!({ "initialized": true, "session_id": session_id }))
}

pub async fn session_snapshot(data: web::Data<AppState>, session: Session) -> HttpResponse {
    match resolve_session(&data, &session, None) {
        Some((_, handle)) => {
            let snapshot = lock_session(&handle).snapshot();
            HttpResponse::Ok().json(snapshot)
        }
        None => session_not_initialized(),
    }
}
