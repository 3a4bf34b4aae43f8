use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use log::{error, info};
use crate::handlers::session_handler::{resolve_session, session_not_initialized};
use crate::models::user_session::lock_session;
use crate::routes::app_state::AppState;
use crate::services::{chat_service, repo_service};

#[derive(Debug, Deserialize)]
pub struct RepoRequest {
    #[serde(default)]
    pub url: String,
    pub session_id: Option<String>,
}

pub async fn handle_load_repository(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<RepoRequest>,
) -> HttpResponse {
    let Some((session_id, handle)) = resolve_session(&data, &session, req_body.session_id.as_deref()) else {
        return session_not_initialized();
    };
    info!("Load repository request for session {}: {}", session_id, req_body.url);

    let outcome = repo_service::ingest_repository(&handle, &req_body.url, data.loader.as_ref()).await;
    let snapshot = lock_session(&handle).snapshot();
    HttpResponse::Ok().json(json!({
        "result": outcome,
        "status": snapshot.upload_status,
        "current_repo": snapshot.current_repo,
        "repo_added": snapshot.repo_added,
    }))
}

pub async fn handle_clear_repository(data: web::Data<AppState>, session: Session) -> HttpResponse {
    match resolve_session(&data, &session, None) {
        Some((session_id, handle)) => match chat_service::clear_repository(&handle).await {
            Ok(()) => HttpResponse::Ok().json(json!({"cleared": true})),
            Err(e) => {
                error!("Failed to drop stored chunks for session {}: {}", session_id, e);
                HttpResponse::InternalServerError().json(json!({
                    "cleared": true,
                    "error": format!("Error: {}", e),
                }))
            }
        },
        None => session_not_initialized(),
    }
}
