use actix_web::web;

pub mod app_state;
pub mod chat_routes;
pub mod page_routes;
pub mod repo_routes;
pub mod session_routes;

/// Registers every JSON and page endpoint. Static files are mounted separately.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(session_routes::init_routes)
        .configure(repo_routes::init_routes)
        .configure(chat_routes::init_routes)
        .configure(page_routes::init_routes);
}
