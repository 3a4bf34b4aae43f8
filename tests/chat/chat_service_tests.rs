use std::sync::Arc;
use futures::StreamExt;
use tokio::sync::Notify;
use repo_chat_agent::models::message::{Message, Role};
use repo_chat_agent::models::user_session::{lock_session, BusyGuard};
use repo_chat_agent::services::chat_service::{
    accept_question, clear_repository, dispatch_chat, reset_chat, stream_answer, ChatOutcome,
    NO_REPOSITORY_MESSAGE, THINKING_PLACEHOLDER,
};
use crate::common::{loaded_session, session_with, StubAnswer, StubKnowledgeBase};

fn roles_and_contents(messages: &[Message]) -> Vec<(Role, String)> {
    messages.iter().map(|m| (m.role, m.content.clone())).collect()
}

#[tokio::test]
async fn one_turn_appends_question_then_answer() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Text("It is a web server.".to_string())));
    let session = loaded_session(kb.clone(), "foo/bar");

    let outcome = dispatch_chat(&session, "What does this repo do?").await;

    assert_eq!(outcome, ChatOutcome::Answered("It is a web server.".to_string()));
    let state = lock_session(&session);
    assert_eq!(
        roles_and_contents(&state.messages),
        vec![
            (Role::User, "What does this repo do?".to_string()),
            (Role::Assistant, "It is a web server.".to_string()),
        ]
    );
    assert!(!state.processing);
    assert_eq!(kb.questions.lock().unwrap().as_slice(), &["What does this repo do?".to_string()]);
}

#[tokio::test]
async fn fragment_answers_are_joined() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Fragments(vec![
        "Uses ".to_string(),
        "actix".to_string(),
        "-web.".to_string(),
    ])));
    let session = loaded_session(kb, "foo/bar");

    let outcome = dispatch_chat(&session, "Which framework?").await;

    assert_eq!(outcome, ChatOutcome::Answered("Uses actix-web.".to_string()));
    assert_eq!(lock_session(&session).messages[1].content, "Uses actix-web.");
}

#[tokio::test]
async fn question_without_repository_is_rejected() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Text("unused".to_string())));
    let session = session_with(kb.clone());

    let outcome = dispatch_chat(&session, "hello?").await;

    assert_eq!(outcome, ChatOutcome::NoRepository(NO_REPOSITORY_MESSAGE.to_string()));
    assert!(lock_session(&session).messages.is_empty());
    assert!(kb.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn busy_session_gets_placeholder() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Text("unused".to_string())));
    let session = loaded_session(kb.clone(), "foo/bar");
    let _busy = BusyGuard::acquire(&session).unwrap();

    let outcome = dispatch_chat(&session, "anyone there?").await;

    assert_eq!(outcome, ChatOutcome::Busy(THINKING_PLACEHOLDER.to_string()));
    assert_eq!(outcome.text(), "Thinking...");
    assert!(lock_session(&session).messages.is_empty());
    assert!(kb.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_question_while_first_in_flight_is_not_queued() {
    let gate = Arc::new(Notify::new());
    let kb = Arc::new(StubKnowledgeBase::gated(StubAnswer::Text("first answer".to_string()), gate.clone()));
    let session = loaded_session(kb.clone(), "foo/bar");

    let first = {
        let session = session.clone();
        tokio::spawn(async move { dispatch_chat(&session, "first").await })
    };
    while !lock_session(&session).processing {
        tokio::task::yield_now().await;
    }

    let second = dispatch_chat(&session, "second").await;
    assert_eq!(second, ChatOutcome::Busy(THINKING_PLACEHOLDER.to_string()));

    gate.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first, ChatOutcome::Answered("first answer".to_string()));

    let state = lock_session(&session);
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].content, "first");
    assert!(!state.processing);
}

#[tokio::test]
async fn failed_chat_shows_error_and_releases_session() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Fail("model unavailable".to_string())));
    let session = loaded_session(kb, "foo/bar");

    let outcome = dispatch_chat(&session, "why?").await;

    assert_eq!(outcome, ChatOutcome::Failed("Error: LLM error: model unavailable".to_string()));
    let state = lock_session(&session);
    assert!(state.messages.is_empty());
    assert!(!state.processing);
}

#[tokio::test]
async fn reset_keeps_active_repository() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Text("answer".to_string())));
    let session = loaded_session(kb, "foo/bar");
    dispatch_chat(&session, "question").await;

    reset_chat(&session);

    let state = lock_session(&session);
    assert!(state.messages.is_empty());
    assert!(state.repo_added);
    assert_eq!(state.current_repo, "foo/bar");
}

#[tokio::test]
async fn clear_repository_forgets_repo_and_history() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Text("answer".to_string())));
    let session = loaded_session(kb.clone(), "foo/bar");
    dispatch_chat(&session, "question").await;
    lock_session(&session).upload_status = "✅ Repository loaded successfully!".to_string();

    clear_repository(&session).await.unwrap();
    assert_eq!(kb.reset_count(), 1);

    let state = lock_session(&session);
    assert!(state.messages.is_empty());
    assert!(!state.repo_added);
    assert_eq!(state.current_repo, "");
    assert_eq!(state.upload_status, "");
    drop(state);

    assert!(matches!(dispatch_chat(&session, "more?").await, ChatOutcome::NoRepository(_)));
}

#[tokio::test]
async fn streamed_answer_is_recorded_when_finished() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Fragments(vec![
        "a".to_string(),
        "b".to_string(),
        "c".to_string(),
    ])));
    let session = loaded_session(kb, "foo/bar");

    let pending = accept_question(&session, "letters?").unwrap();
    let answer = pending.ask().await.unwrap();
    let fragments: Vec<String> = stream_answer(pending, answer).collect().await;

    assert_eq!(fragments, vec!["a", "b", "c"]);
    let state = lock_session(&session);
    assert_eq!(
        roles_and_contents(&state.messages),
        vec![(Role::User, "letters?".to_string()), (Role::Assistant, "abc".to_string())]
    );
    assert!(!state.processing);
}

#[tokio::test]
async fn broken_stream_records_error_notice() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::FailingFragments(
        vec!["partial ".to_string()],
        "socket closed".to_string(),
    )));
    let session = loaded_session(kb, "foo/bar");

    let pending = accept_question(&session, "still there?").unwrap();
    let answer = pending.ask().await.unwrap();
    let fragments: Vec<String> = stream_answer(pending, answer).collect().await;

    let notice = "Error processing response: LLM error: socket closed";
    assert_eq!(fragments, vec!["partial ".to_string(), format!("\n{}", notice)]);
    let state = lock_session(&session);
    assert_eq!(
        roles_and_contents(&state.messages),
        vec![(Role::User, "still there?".to_string()), (Role::Assistant, notice.to_string())]
    );
    assert!(!state.processing);
}

#[tokio::test]
async fn broken_stream_through_dispatch_gives_notice() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::FailingFragments(
        vec!["a".to_string(), "b".to_string()],
        "timeout".to_string(),
    )));
    let session = loaded_session(kb, "foo/bar");

    let outcome = dispatch_chat(&session, "q").await;

    assert_eq!(
        outcome,
        ChatOutcome::Answered("Error processing response: LLM error: timeout".to_string())
    );
    assert!(!lock_session(&session).processing);
}

#[tokio::test]
async fn refused_question_leaves_session_idle() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Text("answer".to_string())));
    let session = loaded_session(kb.clone(), "foo/bar");
    clear_repository(&session).await.unwrap();

    assert!(matches!(accept_question(&session, "q"), Err(ChatOutcome::NoRepository(_))));
    assert!(!lock_session(&session).processing);

    // A busy session without a repository reports the missing repository.
    let _busy = BusyGuard::acquire(&session).unwrap();
    assert!(matches!(accept_question(&session, "q"), Err(ChatOutcome::NoRepository(_))));
    assert!(kb.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dropped_stream_releases_session_without_recording() {
    let kb = Arc::new(StubKnowledgeBase::answering(StubAnswer::Fragments(vec![
        "partial".to_string(),
        " answer".to_string(),
    ])));
    let session = loaded_session(kb, "foo/bar");

    let pending = accept_question(&session, "question").unwrap();
    let answer = pending.ask().await.unwrap();
    assert!(lock_session(&session).processing);

    let mut stream = Box::pin(stream_answer(pending, answer));
    assert_eq!(stream.next().await.as_deref(), Some("partial"));
    drop(stream);

    let state = lock_session(&session);
    assert!(state.messages.is_empty());
    assert!(!state.processing);
}
