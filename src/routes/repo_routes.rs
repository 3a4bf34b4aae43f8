use actix_web::{delete, post, web, Responder};
use actix_session::Session;
use crate::handlers::repo_handler::RepoRequest;
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(load_repository)
        .service(clear_repository);
}

#[post("/repository")]
async fn load_repository(
    data: web::Data<AppState>,
    session: Session,
    req_body: web::Json<RepoRequest>
) -> impl Responder {
    crate::handlers::repo_handler::handle_load_repository(data, session, req_body).await
}

#[delete("/repository")]
async fn clear_repository(data: web::Data<AppState>, session: Session) -> impl Responder {
    crate::handlers::repo_handler::handle_clear_repository(data, session).await
}
