#[path = "../common/mod.rs"]
mod common;

use std::io::Write;
use std::sync::Arc;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use repo_chat_agent::config::AppConfig;
use repo_chat_agent::models::global_session_manager::GlobalSessionManager;
use repo_chat_agent::models::user_session::BusyGuard;
use repo_chat_agent::routes::{self, app_state::AppState};
use repo_chat_agent::services::knowledge_base::KnowledgeBase;
use common::{NoopLoader, StubAnswer, StubKnowledgeBase};

fn state_with(answer: StubAnswer, config: AppConfig) -> AppState {
    AppState {
        config: Arc::new(config),
        session_manager: GlobalSessionManager::new(),
        knowledge_base_factory: Arc::new(move || {
            Ok(Arc::new(StubKnowledgeBase::answering(answer.clone())) as Arc<dyn KnowledgeBase>)
        }),
        loader: Arc::new(NoopLoader),
    }
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($state))
                .configure(routes::configure),
        )
        .await
    };
}

/// Calls `/init_session` and returns the session cookie it sets.
macro_rules! start_session {
    ($app:expr) => {{
        let resp = test::call_service($app, test::TestRequest::get().uri("/init_session").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.response().cookies().next().expect("session cookie").into_owned();
        cookie
    }};
}

#[actix_web::test]
async fn chat_without_session_is_rejected() {
    let app = init_app!(state_with(StubAnswer::Text("unused".to_string()), AppConfig::default()));

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Session not initialized");
}

#[actix_web::test]
async fn load_chat_reset_and_clear() {
    let app = init_app!(state_with(StubAnswer::Text("It parses TOML.".to_string()), AppConfig::default()));
    let cookie = start_session!(&app);

    let req = test::TestRequest::post()
        .uri("/repository")
        .cookie(cookie.clone())
        .set_json(json!({"url": "https://github.com/toml-rs/toml/"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["result"]["outcome"], "loaded");
    assert_eq!(body["current_repo"], "toml-rs/toml");
    assert_eq!(body["status"], "✅ Repository loaded successfully!");

    let req = test::TestRequest::post()
        .uri("/chat")
        .cookie(cookie.clone())
        .set_json(json!({"message": "What does it do?"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["response"], "It parses TOML.");
    assert_eq!(body["result"]["outcome"], "answered");

    let req = test::TestRequest::get().uri("/session").cookie(cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][1]["role"], "assistant");
    assert_eq!(body["processing"], false);

    let req = test::TestRequest::post().uri("/chat/reset").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/session").cookie(cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);
    assert_eq!(body["current_repo"], "toml-rs/toml");

    let req = test::TestRequest::delete().uri("/repository").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/session").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["repo_added"], false);
    assert_eq!(body["current_repo"], "");
}

#[actix_web::test]
async fn stream_endpoint_writes_fragments() {
    let answer = StubAnswer::Fragments(vec!["one ".to_string(), "two".to_string()]);
    let app = init_app!(state_with(answer, AppConfig::default()));
    let cookie = start_session!(&app);

    let req = test::TestRequest::post()
        .uri("/repository")
        .cookie(cookie.clone())
        .set_json(json!({"url": "foo/bar"}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/chat/stream")
        .cookie(cookie.clone())
        .set_json(json!({"message": "count"}))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, web::Bytes::from_static(b"one two"));

    let req = test::TestRequest::get().uri("/session").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"][1]["content"], "one two");
}

#[actix_web::test]
async fn stream_endpoint_answers_placeholder_while_busy() {
    let state = state_with(StubAnswer::Text("unused".to_string()), AppConfig::default());
    let sessions = state.session_manager.clone();
    let app = init_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/init_session").to_request()).await;
    let cookie = resp.response().cookies().next().expect("session cookie").into_owned();
    let body: Value = test::read_body_json(resp).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/repository")
        .cookie(cookie.clone())
        .set_json(json!({"url": "foo/bar"}))
        .to_request();
    test::call_service(&app, req).await;

    let handle = sessions.get(&session_id).unwrap();
    let busy = BusyGuard::acquire(&handle).unwrap();

    let req = test::TestRequest::post()
        .uri("/chat/stream")
        .cookie(cookie.clone())
        .set_json(json!({"message": "anyone?"}))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, web::Bytes::from_static(b"Thinking..."));

    drop(busy);
    let req = test::TestRequest::get().uri("/session").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);
    assert_eq!(body["processing"], false);
}

#[actix_web::test]
async fn empty_message_is_a_bad_request() {
    let app = init_app!(state_with(StubAnswer::Text("unused".to_string()), AppConfig::default()));
    let cookie = start_session!(&app);

    let req = test::TestRequest::post()
        .uri("/chat")
        .cookie(cookie)
        .set_json(json!({"message": "  "}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn chat_before_loading_a_repository() {
    let app = init_app!(state_with(StubAnswer::Text("unused".to_string()), AppConfig::default()));
    let cookie = start_session!(&app);

    let req = test::TestRequest::post()
        .uri("/chat")
        .cookie(cookie)
        .set_json(json!({"message": "hi"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["result"]["outcome"], "no_repository");
}

#[actix_web::test]
async fn footer_is_served_verbatim() {
    let mut footer = tempfile::NamedTempFile::new().unwrap();
    write!(footer, "<footer>made with care</footer>").unwrap();
    let mut config = AppConfig::default();
    config.server.footer_path = footer.path().to_path_buf();
    let app = init_app!(state_with(StubAnswer::Text(String::new()), config));

    let req = test::TestRequest::get().uri("/footer").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, web::Bytes::from_static(b"<footer>made with care</footer>"));
}

#[actix_web::test]
async fn missing_footer_is_a_server_error() {
    let mut config = AppConfig::default();
    config.server.footer_path = "does/not/exist.html".into();
    let app = init_app!(state_with(StubAnswer::Text(String::new()), config));

    let req = test::TestRequest::get().uri("/footer").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
