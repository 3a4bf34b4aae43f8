use actix_web::{get, web, Responder};
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(footer);
}

#[get("/footer")]
async fn footer(data: web::Data<AppState>) -> impl Responder {
    crate::handlers::page_handler::handle_footer(&data.config.server.footer_path).await
}
