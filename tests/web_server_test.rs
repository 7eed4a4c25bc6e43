mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use mentor::collaborators::Completion;
use mentor::web_server::{router, AppState};
use mentor::CollaboratorError;
use serde_json::Value;
use support::*;

fn test_server() -> TestServer {
    test_server_with(default_completion())
}

fn test_server_with(completion: Arc<dyn Completion>) -> TestServer {
    let manager = mentor::SessionManager::new(
        Arc::new(roadmap()),
        Arc::new(rust_videos()),
        Arc::new(rust_repositories()),
        completion,
    );
    let state = AppState::new(manager, "templates");
    TestServer::new(router(state, "static")).unwrap()
}

/// Posts a topic and returns the new session's page path.
async fn create_session(server: &TestServer) -> String {
    let response = server.post("/sessions").form(&[("topic", "Rust")]).await;
    response.assert_status(StatusCode::SEE_OTHER);
    response
        .header("location")
        .to_str()
        .unwrap()
        .to_string()
}

async fn session_json(server: &TestServer, page: &str) -> Value {
    let response = server.get(&format!("/api{page}")).await;
    response.assert_status_ok();
    response.json::<Value>()
}

#[tokio::test]
async fn test_index_shows_topic_form() {
    let server = test_server();

    let response = server.get("/").await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("action=\"/sessions\""));
    assert!(html.contains("Generate Learning Plan"));
}

#[tokio::test]
async fn test_create_session_renders_roadmap() {
    let server = test_server();
    let page = create_session(&server).await;
    assert!(page.starts_with("/sessions/"));

    let response = server.get(&page).await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("Week 1: basics"));
    assert!(html.contains("<a href=\"http://v1\""));
    assert!(html.contains("rust-lang/rust"));

    let json = session_json(&server, &page).await;
    assert_eq!(json["topic"], "Rust");
    assert_eq!(json["roadmap_given"], true);
    assert_eq!(json["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_topic_is_rejected() {
    let server = test_server();

    let response = server.post("/sessions").form(&[("topic", "   ")]).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("topic must not be empty"));
}

#[tokio::test]
async fn test_follow_up_question() {
    let server = test_server();
    let page = create_session(&server).await;

    let response = server
        .post(&format!("{page}/ask"))
        .form(&[("question", "What is borrowing?")])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let json = session_json(&server, &page).await;
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1]["sender"], "user");
    assert_eq!(history[1]["text"], "What is borrowing?");
    assert_eq!(history[2]["text"], "Here is an answer.");
}

#[tokio::test]
async fn test_follow_up_failure_shows_fallback() {
    let completion = Arc::new(MockCompletion::new(|_| {
        Err(CollaboratorError::Response("model unavailable".to_string()))
    }));
    let server = test_server_with(completion);
    let page = create_session(&server).await;

    let response = server
        .post(&format!("{page}/ask"))
        .form(&[("question", "Why?")])
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let html = response.text();
    assert!(html.contains("Sorry, I encountered an error"));
    assert!(html.contains("model unavailable"));
}

#[tokio::test]
async fn test_quiz_flow() {
    let server = test_server();
    let page = create_session(&server).await;

    let response = server
        .post(&format!("{page}/quiz"))
        .form(&[("difficulty", "easy"), ("count", "2")])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let json = session_json(&server, &page).await;
    assert_eq!(json["quiz"]["questions"].as_array().unwrap().len(), 2);
    assert_eq!(json["quiz"]["difficulty"], "easy");

    let response = server
        .post(&format!("{page}/quiz/0"))
        .form(&[("option", "B. Lyon")])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let html = server.get(&page).await.text();
    assert!(html.contains("Capital of France?"));
    assert!(html.contains("Not quite, the answer is A."));
    assert!(html.contains("Paris is the capital."));

    let json = session_json(&server, &page).await;
    assert_eq!(json["quiz"]["answers"]["0"], "B. Lyon");
}

#[tokio::test]
async fn test_quiz_bad_input() {
    let server = test_server();
    let page = create_session(&server).await;

    let response = server
        .post(&format!("{page}/quiz"))
        .form(&[("difficulty", "easy"), ("count", "ten")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post(&format!("{page}/quiz"))
        .form(&[("difficulty", "impossible"), ("count", "2")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post(&format!("{page}/quiz/0"))
        .form(&[("option", "A. Paris")])
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let server = test_server();
    let page = format!("/sessions/{}", uuid::Uuid::new_v4());

    server.get(&page).await.assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api{page}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post(&format!("{page}/ask"))
        .form(&[("question", "hello")])
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_discards_session() {
    let server = test_server();
    let page = create_session(&server).await;

    let response = server.post(&format!("{page}/reset")).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/");

    server
        .get(&format!("/api{page}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_template_is_server_error() {
    let templates = tempfile::TempDir::new().unwrap();
    let manager = mentor::SessionManager::new(
        Arc::new(roadmap()),
        Arc::new(rust_videos()),
        Arc::new(rust_repositories()),
        default_completion(),
    );
    let state = AppState::new(manager, templates.path());
    let server = TestServer::new(router(state, "static")).unwrap();

    let response = server.get("/").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("Internal Server Error"));
}

#[tokio::test]
async fn test_static_files() {
    let server = test_server();

    server.get("/static/style.css").await.assert_status_ok();
    server
        .get("/static/missing.css")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idle_session_expires() {
    let manager = mentor::SessionManager::new(
        Arc::new(roadmap()),
        Arc::new(rust_videos()),
        Arc::new(rust_repositories()),
        default_completion(),
    );
    let state = AppState::new(manager, "templates").with_session_idle_timeout(Duration::ZERO);
    let server = TestServer::new(router(state, "static")).unwrap();
    let page = create_session(&server).await;

    server.get(&page).await.assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api{page}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
