use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Form, Json, Router,
};
use minijinja::{path_loader, Environment, Value};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::constants::{DEFAULT_SESSION_IDLE_SECS, MAX_QUIZ_QUESTIONS};
use crate::quiz::{AnswerCheck, Difficulty};
use crate::{Session, SessionError, SessionManager};

struct StoredSession {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

/// Live sessions keyed by id. Each session has its own lock, held for the
/// whole of an operation, so requests against one session run one at a time.
/// Sessions untouched for longer than the idle timeout are dropped.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS))
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub async fn insert(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, stored| now.duration_since(stored.last_used) < self.idle_timeout);
        sessions.insert(
            id,
            StoredSession {
                session: Arc::new(Mutex::new(session)),
                last_used: now,
            },
        );
        id
    }

    /// Looks a session up and marks it as used. An expired session is
    /// removed and reported as missing.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let stored = sessions.get_mut(&id)?;
        if now.duration_since(stored.last_used) >= self.idle_timeout {
            sessions.remove(&id);
            info!(%id, "Session expired");
            return None;
        }
        stored.last_used = now;
        Some(stored.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Drops every session idle for longer than the timeout; returns how many.
    pub async fn prune_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let now = Instant::now();
        sessions.retain(|_, stored| now.duration_since(stored.last_used) < self.idle_timeout);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    manager: SessionManager,
    sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(manager: SessionManager, templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir)),
            manager,
            sessions: Arc::new(SessionStore::default()),
        }
    }

    pub fn with_session_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.sessions = Arc::new(SessionStore::new(idle_timeout));
        self
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: impl Into<PathBuf>) -> AutoReloader {
    let templates_dir = templates_dir.into();
    // Use AutoReloader for development convenience
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        env.add_filter("markdown", markdown_filter);
        // Watch the templates directory for changes
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

/// Markdown to sanitized HTML. Model output is untrusted, so everything goes
/// through ammonia before it reaches the page.
pub fn render_markdown(input: &str) -> String {
    let mut options = pulldown_cmark::Options::empty();
    options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
    options.insert(pulldown_cmark::Options::ENABLE_TABLES);

    let parser = pulldown_cmark::Parser::new_ext(input, options);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    ammonia::clean(&html)
}

fn markdown_filter(input: &str) -> Value {
    Value::from_safe_string(render_markdown(input))
}

fn render(state: &AppState, name: &str, context: Value, status: StatusCode) -> Response {
    // Acquire env, get template, and render within the same block
    let rendered = state.templates.acquire_env().and_then(|env| {
        let tmpl = env.get_template(name)?;
        tmpl.render(context)
    });
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Failed to get or render template {}: {}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        }
    }
}

fn status_for(err: &SessionError) -> StatusCode {
    match err {
        SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SessionError::InvalidState(_) => StatusCode::CONFLICT,
        SessionError::Upstream(_) | SessionError::QuizFormat(_) => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Serialize)]
struct QuestionView<'a> {
    index: usize,
    prompt: &'a str,
    options: &'a [String],
    selected: Option<&'a str>,
    check: Option<AnswerCheck>,
}

#[derive(Serialize)]
struct QuizView<'a> {
    difficulty: Difficulty,
    questions: Vec<QuestionView<'a>>,
    answered: usize,
    correct: usize,
}

fn quiz_view<'a>(manager: &SessionManager, session: &'a Session) -> Option<QuizView<'a>> {
    let quiz = session.quiz()?;
    let questions: Vec<QuestionView<'a>> = quiz
        .questions()
        .iter()
        .enumerate()
        .map(|(index, question)| QuestionView {
            index,
            prompt: &question.prompt,
            options: &question.options,
            selected: quiz.answer(index),
            check: manager.check_answer(session, index).ok(),
        })
        .collect();
    let answered = questions.iter().filter(|q| q.check.is_some()).count();
    let correct = questions
        .iter()
        .filter(|q| q.check.as_ref().is_some_and(|c| c.correct))
        .count();
    Some(QuizView {
        difficulty: quiz.difficulty(),
        questions,
        answered,
        correct,
    })
}

fn render_index(state: &AppState, topic: &str, error: Option<&SessionError>) -> Response {
    let context = minijinja::context! {
        title => "Mentor",
        topic => topic,
        error => error.map(ToString::to_string),
    };
    let status = error.map_or(StatusCode::OK, status_for);
    render(state, "index.html", context, status)
}

fn render_session(
    state: &AppState,
    id: Uuid,
    session: &Session,
    error: Option<&SessionError>,
) -> Response {
    let context = minijinja::context! {
        title => format!("Learning {}", session.topic()),
        session_id => id.to_string(),
        topic => session.topic(),
        messages => session.history(),
        summary => session.summary(),
        quiz => quiz_view(&state.manager, session),
        max_questions => MAX_QUIZ_QUESTIONS,
        error => error.map(ToString::to_string),
    };
    let status = error.map_or(StatusCode::OK, status_for);
    render(state, "session.html", context, status)
}

fn session_not_found(id: Uuid) -> Response {
    warn!(%id, "Unknown session requested");
    (
        StatusCode::NOT_FOUND,
        Html(format!("Session {} not found. <a href=\"/\">Start over</a>", id)),
    )
        .into_response()
}

fn redirect_to_session(id: Uuid) -> Response {
    Redirect::to(&format!("/sessions/{}", id)).into_response()
}

#[derive(Deserialize)]
struct TopicForm {
    topic: String,
}

#[derive(Deserialize)]
struct QuestionForm {
    question: String,
}

#[derive(Deserialize)]
struct QuizForm {
    difficulty: String,
    count: String,
}

#[derive(Deserialize)]
struct AnswerForm {
    option: String,
}

async fn index_handler(State(state): State<AppState>) -> Response {
    render_index(&state, "", None)
}

async fn create_session_handler(
    State(state): State<AppState>,
    Form(form): Form<TopicForm>,
) -> Response {
    let mut session = Session::new();
    match state.manager.start_topic(&mut session, &form.topic).await {
        Ok(()) => {
            let id = state.sessions.insert(session).await;
            info!(%id, "Session created");
            redirect_to_session(id)
        }
        Err(e) => render_index(&state, &form.topic, Some(&e)),
    }
}

async fn session_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let session = handle.lock().await;
    render_session(&state, id, &session, None)
}

async fn ask_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<QuestionForm>,
) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let mut session = handle.lock().await;
    match state.manager.ask_follow_up(&mut session, &form.question).await {
        Ok(()) => redirect_to_session(id),
        Err(e) => render_session(&state, id, &session, Some(&e)),
    }
}

async fn quiz_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<QuizForm>,
) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let mut session = handle.lock().await;
    let result = match (
        form.difficulty.parse::<Difficulty>(),
        form.count.trim().parse::<usize>(),
    ) {
        (Ok(difficulty), Ok(count)) => {
            state
                .manager
                .request_quiz(&mut session, difficulty, count)
                .await
        }
        (Err(e), _) => Err(e),
        (_, Err(_)) => Err(SessionError::InvalidInput(format!(
            "'{}' is not a question count",
            form.count
        ))),
    };
    match result {
        Ok(()) => redirect_to_session(id),
        Err(e) => render_session(&state, id, &session, Some(&e)),
    }
}

async fn answer_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Form(form): Form<AnswerForm>,
) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return session_not_found(id);
    };
    let mut session = handle.lock().await;
    match state.manager.record_answer(&mut session, index, &form.option) {
        Ok(()) => Redirect::to(&format!("/sessions/{}#q{}", id, index)).into_response(),
        Err(e) => render_session(&state, id, &session, Some(&e)),
    }
}

async fn reset_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    if state.sessions.remove(id).await {
        info!(%id, "Session discarded");
    }
    Redirect::to("/").into_response()
}

async fn session_json_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let Some(handle) = state.sessions.get(id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let session = handle.lock().await.clone();
    Json(session).into_response()
}

pub fn router(state: AppState, static_dir: impl AsRef<FsPath>) -> Router {
    // Serve static files from the static directory
    let static_files_service =
        ServeDir::new(static_dir.as_ref()).not_found_service(tower::service_fn(|_| async {
            Ok::<_, std::convert::Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
        }));

    Router::new()
        .route("/", get(index_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/:id", get(session_handler))
        .route("/sessions/:id/ask", post(ask_handler))
        .route("/sessions/:id/quiz", post(quiz_handler))
        .route("/sessions/:id/quiz/:index", post(answer_handler))
        .route("/sessions/:id/reset", post(reset_handler))
        .route("/api/sessions/:id", get(session_json_handler))
        // Route for static files must be nested under a path like /static
        // or it will conflict with other routes.
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(port: u16, state: AppState, static_dir: PathBuf) -> Result<()> {
    // Idle sessions are also dropped lazily on lookup; the sweep covers the
    // ones nobody comes back to.
    let sessions = state.sessions.clone();
    let sweep_every = sessions
        .idle_timeout
        .clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let pruned = sessions.prune_expired().await;
            if pruned > 0 {
                info!(pruned, "Expired idle sessions");
            }
        }
    });

    let app = router(state, static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown_links_and_lists() {
        let html = render_markdown("**Week 1**\n\n- [Intro](http://v1)");
        assert!(html.contains("<strong>Week 1</strong>"));
        assert!(html.contains("<li><a href=\"http://v1\""));
    }

    #[test]
    fn test_render_markdown_strips_scripts() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(html.contains("hello"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_status_for_errors() {
        assert_eq!(
            status_for(&SessionError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SessionError::InvalidState("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SessionError::QuizFormat("x".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_session_store() {
        let store = SessionStore::default();
        assert!(store.is_empty().await);
        let id = store.insert(Session::new()).await;
        assert!(store.get(id).await.is_some());
        assert_eq!(store.len().await, 1);
        assert!(store.remove(id).await);
        assert!(!store.remove(id).await);
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_store_expires_idle_sessions() {
        let store = SessionStore::new(Duration::from_secs(60));
        let kept = store.insert(Session::new()).await;
        let idle = store.insert(Session::new()).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(store.get(kept).await.is_some());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(store.get(idle).await.is_none());
        assert!(store.get(kept).await.is_some());
        assert_eq!(store.len().await, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.prune_expired().await, 1);
        assert!(store.is_empty().await);
    }
}
