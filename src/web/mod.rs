// Web interface
// A single-page question form plus a JSON endpoint, served with axum


use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::qa::{AnswerResult, Answerer};

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Please enter a question")]
    EmptyQuestion,
    #[error("The question could not be answered right now, please try again later")]
    Upstream,
}

impl WebError {
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyQuestion => StatusCode::BAD_REQUEST,
            Self::Upstream => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyQuestion => "EMPTY_QUESTION",
            Self::Upstream => "UPSTREAM_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for WebError {
    #[inline]
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    answerer: Arc<dyn Answerer>,
    // one question at a time
    gate: Arc<Mutex<()>>,
    title: String,
    description: String,
}

impl AppState {
    #[inline]
    pub fn new(answerer: Arc<dyn Answerer>, title: &str, description: &str) -> Self {
        Self {
            answerer,
            gate: Arc::new(Mutex::new(())),
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    async fn answer(&self, question: &str) -> Result<AnswerResult, WebError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(WebError::EmptyQuestion);
        }

        let _guard = self.gate.lock().await;
        self.answerer.answer(question).await.map_err(|e| {
            error!("Failed to answer question: {}", e);
            WebError::Upstream
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub source_file: String,
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceEntry>,
    pub sources_text: String,
}

impl From<AnswerResult> for AskResponse {
    #[inline]
    fn from(result: AnswerResult) -> Self {
        let sources_text = result.format_sources();
        Self {
            answer: result.answer,
            sources: result
                .sources
                .into_iter()
                .map(|chunk| SourceEntry {
                    source_file: chunk.source_file,
                    page_number: chunk.page_number,
                    text: chunk.text,
                })
                .collect(),
            sources_text,
        }
    }
}

#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask_form))
        .route("/api/ask", post(ask_json))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the form on the configured address until Ctrl+C
#[inline]
pub async fn serve(config: &ServerConfig, answerer: Arc<dyn Answerer>) -> anyhow::Result<()> {
    let state = AppState::new(answerer, &config.title, &config.description);
    let address = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Serving on http://{}", address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state, &PageView::default()))
}

async fn health() -> &'static str {
    "ok"
}

async fn ask_form(State(state): State<AppState>, Form(form): Form<AskForm>) -> Response {
    match state.answer(&form.question).await {
        Ok(result) => {
            let view = PageView {
                question: &form.question,
                answer: Some(&result.answer),
                sources: Some(result.format_sources()),
                error: None,
            };
            Html(render_page(&state, &view)).into_response()
        }
        Err(e) => {
            let message = e.to_string();
            let view = PageView {
                question: &form.question,
                answer: None,
                sources: None,
                error: Some(&message),
            };
            (e.status_code(), Html(render_page(&state, &view))).into_response()
        }
    }
}

async fn ask_json(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, WebError> {
    let result = state.answer(&request.question).await?;
    Ok(Json(result.into()))
}

#[derive(Default)]
struct PageView<'a> {
    question: &'a str,
    answer: Option<&'a str>,
    sources: Option<String>,
    error: Option<&'a str>,
}

fn render_page(state: &AppState, view: &PageView<'_>) -> String {
    let title = html_escape::encode_text(&state.title);
    let description = html_escape::encode_text(&state.description);
    let question = html_escape::encode_text(view.question);

    let mut sections = Vec::new();
    if let Some(message) = view.error {
        sections.push(format!(
            "<p class=\"error\">{}</p>\n",
            html_escape::encode_text(message)
        ));
    }
    if let Some(answer) = view.answer {
        sections.push(format!(
            "<h2>Answer</h2>\n<pre class=\"answer\">{}</pre>\n",
            html_escape::encode_text(answer)
        ));
    }
    if let Some(sources) = &view.sources {
        sections.push(format!(
            "<h2>Sources</h2>\n<pre class=\"sources\">{}</pre>\n",
            html_escape::encode_text(sources)
        ));
    }
    let outputs = sections.concat();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
textarea {{ width: 100%; }}
pre {{ white-space: pre-wrap; background: #f5f5f5; padding: 0.75rem; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{description}</p>
<form method="post" action="/ask">
<label for="question">Question</label>
<textarea id="question" name="question" rows="3" placeholder="Enter your question here...">{question}</textarea>
<button type="submit">Submit</button>
</form>
{outputs}</body>
</html>
"#
    )
}
