use actix_web::{post, web, Responder};
use actix_session::Session;
use crate::handlers::chat_handler::ChatRequest;
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(chat)
        .service(chat_stream)
        .service(chat_reset);
}

#[post("/chat")]
async fn chat(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<ChatRequest>
) -> impl Responder {
    crate::handlers::chat_handler::handle_chat_request(data, session, req_body).await
}

#[post("/chat/stream")]
async fn chat_stream(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<ChatRequest>
) -> impl Responder {
    crate::handlers::chat_handler::handle_stream_request(data, session, req_body).await
}

#[post("/chat/reset")]
async fn chat_reset(data: web::Data<AppState>, session: Session) -> impl Responder {
    crate::handlers::chat_handler::handle_reset(data, session).await
}
