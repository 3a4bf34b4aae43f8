use std::path::{Path, PathBuf};
use actix_web::{web, HttpResponse};
use log::error;

/// Reads the footer fragment to be rendered verbatim, off the request worker.
pub async fn footer(path: PathBuf) -> std::io::Result<String> {
    web::block(move || std::fs::read_to_string(path))
        .await
        .map_err(std::io::Error::other)?
}

pub async fn handle_footer(path: &Path) -> HttpResponse {
    match footer(path.to_path_buf()).await {
        Ok(html) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Err(e) => {
            error!("Failed to read footer {}: {}", path.display(), e);
            HttpResponse::InternalServerError().body("Footer unavailable")
        }
    }
}
