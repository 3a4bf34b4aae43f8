use std::sync::Arc;
use std::time::Duration;
use actix_files::Files;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use repo_chat_agent::config;
use repo_chat_agent::models::global_session_manager::GlobalSessionManager;
use repo_chat_agent::routes::{self, app_state::AppState};
use repo_chat_agent::services::github_loader::GithubLoader;
use repo_chat_agent::services::knowledge_base::config_factory;
use repo_chat_agent::services::session_service;

const EVICTION_PERIOD: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    config::init_logging();

    let config = Arc::new(config::load_config().context("Failed to load configuration")?);
    let loader = GithubLoader::new(config.secrets.github_token.clone(), &config.github)
        .context("Failed to build GitHub loader")?;

    let state = AppState {
        config: Arc::clone(&config),
        session_manager: GlobalSessionManager::new(),
        knowledge_base_factory: config_factory(Arc::clone(&config)),
        loader: Arc::new(loader),
    };
    let reaper_sessions = state.session_manager.clone();
    let max_idle = config.session_idle_timeout();
    actix_web::rt::spawn(async move {
        let mut ticks = actix_web::rt::time::interval(EVICTION_PERIOD);
        loop {
            ticks.tick().await;
            session_service::evict_idle_sessions(&reaper_sessions, max_idle).await;
        }
    });

    let session_key = Key::generate();
    let static_dir = config.server.static_dir.clone();
    let bind = (config.server.host.clone(), config.server.port);

    log::info!("Starting server on http://{}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            // Use the Logger middleware to log incoming requests.
            .wrap(Logger::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_secure(false)
                    .build(),
            )
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
            // Serve the page (index.html) from the static directory.
            .service(Files::new("/", static_dir.clone()).index_file("index.html"))
    })
        .bind(bind)?
        .run()
        .await?;

    Ok(())
}
