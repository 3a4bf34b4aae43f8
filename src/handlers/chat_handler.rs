use actix_web::{web, HttpResponse};
use actix_session::Session;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use log::{info, error};
use crate::handlers::session_handler::{resolve_session, session_not_initialized};
use crate::routes::app_state::AppState;
use crate::services::chat_service::{self, ChatOutcome};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub session_id: Option<String>,
}

fn empty_message() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({"error": "Message must not be empty"}))
}

pub async fn handle_chat_request(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<ChatRequest>,
) -> HttpResponse {
    let Some((session_id, handle)) = resolve_session(&data, &session, req_body.session_id.as_deref()) else {
        return session_not_initialized();
    };
    if req_body.message.trim().is_empty() {
        return empty_message();
    }
    info!("Processing message for session {}: {}", session_id, req_body.message);

    let outcome = chat_service::dispatch_chat(&handle, &req_body.message).await;
    HttpResponse::Ok().json(json!({
        "response": outcome.text(),
        "result": outcome,
    }))
}

/// Same acceptance rules as [`handle_chat_request`], but the answer is written
/// to the response as it arrives.
pub async fn handle_stream_request(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<ChatRequest>,
) -> HttpResponse {
    let Some((session_id, handle)) = resolve_session(&data, &session, req_body.session_id.as_deref()) else {
        return session_not_initialized();
    };
    if req_body.message.trim().is_empty() {
        return empty_message();
    }
    info!("Streaming answer for session {}: {}", session_id, req_body.message);

    let plain_text = |body: String| {
        HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(body)
    };

    let pending = match chat_service::accept_question(&handle, &req_body.message) {
        Ok(pending) => pending,
        Err(outcome) => return plain_text(outcome.text().to_string()),
    };

    match pending.ask().await {
        Ok(answer) => {
            let body = chat_service::stream_answer(pending, answer)
                .map(|fragment| Ok::<Bytes, actix_web::Error>(Bytes::from(fragment)));
            HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .streaming(body)
        }
        Err(e) => {
            error!("Chat failed for session {}: {}", session_id, e);
            plain_text(ChatOutcome::Failed(format!("Error: {}", e)).text().to_string())
        }
    }
}

pub async fn handle_reset(data: web::Data<AppState>, session: Session) -> HttpResponse {
    match resolve_session(&data, &session, None) {
        Some((_, handle)) => {
            chat_service::reset_chat(&handle);
            HttpResponse::Ok().json(json!({"reset": true}))
        }
        None => session_not_initialized(),
    }
}
