//! Web surface: upload a PDF, view the generated questions, download the
//! JSON snapshot.
//!
//! Routes:
//! - `GET /` upload form
//! - `POST /upload` multipart field `pdf`; analyzes it and renders results
//! - `GET /download` the JSON snapshot as an attachment
//! - `GET /images/:name` an extracted image
//! - `GET /health` liveness check
//!
//! All uploads share one captioner, so analyses are serialized behind a
//! mutex held from saving the upload until the snapshot is written.

use crate::analyze::analyze;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::output::AnalysisResult;
use crate::pipeline::caption::ImageCaptioner;
use crate::sink::ResultSink;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Default directory uploaded PDFs are stored in.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const INDEX_TEMPLATE: &str = "index";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>PDF Quiz Extractor</title>
<style>
body{font-family:Arial,sans-serif;max-width:960px;margin:0 auto;padding:20px;color:#222;}
.page{border-top:1px solid #ddd;padding:12px 0;}
.page pre{white-space:pre-wrap;background:#f7f7f7;padding:8px;}
.question{display:flex;gap:16px;margin:12px 0;}
.question img{max-width:240px;max-height:240px;border:1px solid #ccc;}
.error{color:#b00020;}
</style>
</head>
<body>
<h1>PDF Quiz Extractor</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="pdf" accept="application/pdf">
<button type="submit">Analyze</button>
</form>
{{#if error}}<p class="error">{{error}}</p>{{/if}}
{{#if pages}}
<p><a href="/download">Download JSON</a></p>
{{#each pages}}
<div class="page">
<h2>Page {{page}}</h2>
{{#if text}}<pre>{{text}}</pre>{{/if}}
{{#each questions}}
<div class="question">
<img src="{{image_url}}" alt="{{caption}}">
<div>
<p><strong>{{question}}</strong></p>
<ol type="A">{{#each options}}<li>{{this}}</li>{{/each}}</ol>
<p>Answer: {{answer}}</p>
</div>
</div>
{{/each}}
</div>
{{/each}}
{{/if}}
</body>
</html>
"#;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    captioner: Arc<dyn ImageCaptioner>,
    config: Arc<AnalysisConfig>,
    sink: ResultSink,
    upload_dir: PathBuf,
    templates: Arc<Handlebars<'static>>,
    analysis_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        captioner: Arc<dyn ImageCaptioner>,
        config: AnalysisConfig,
        upload_dir: impl Into<PathBuf>,
    ) -> Result<Self, AnalysisError> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string(INDEX_TEMPLATE, INDEX_HTML)
            .map_err(|e| AnalysisError::Internal(format!("template: {}", e)))?;

        Ok(Self {
            captioner,
            sink: ResultSink::from_config(&config),
            config: Arc::new(config),
            upload_dir: upload_dir.into(),
            templates: Arc::new(templates),
            analysis_lock: Arc::new(Mutex::new(())),
        })
    }

    fn render(&self, view: &IndexView) -> Response {
        match self.templates.render(INDEX_TEMPLATE, view) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Template rendering failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template rendering failed").into_response()
            }
        }
    }
}

// ── View model ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
struct IndexView {
    error: Option<String>,
    pages: Vec<PageView>,
}

#[derive(Debug, Serialize)]
struct PageView {
    page: usize,
    text: String,
    questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
struct QuestionView {
    image_url: String,
    question: String,
    caption: String,
    options: Vec<String>,
    answer: String,
}

impl IndexView {
    fn from_result(result: &AnalysisResult) -> Self {
        let pages = result
            .pages
            .iter()
            .map(|p| PageView {
                page: p.page,
                text: p.text.clone(),
                questions: p
                    .ai_generated_questions
                    .iter()
                    .map(|q| QuestionView {
                        image_url: image_url(&q.image),
                        question: q.question.clone(),
                        caption: q.caption.clone(),
                        options: q.options.to_vec(),
                        answer: q.answer.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self { error: None, pages }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            pages: Vec::new(),
        }
    }
}

/// URL under `/images/` for a stored image path.
fn image_url(stored: &str) -> String {
    let name = Path::new(stored)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("/images/{}", name)
}

// ── Router ───────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/download", get(download))
        .route("/images/:name", get(serve_image))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the app until the process is stopped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).await
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Response {
    state.render(&IndexView::default())
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Upload error: {}", e)).into_response()
            }
        };
        if field.name() != Some("pdf") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Read error: {}", e)).into_response()
            }
        };
        upload = Some((file_name, data.to_vec()));
        break;
    }

    let Some((file_name, data)) = upload else {
        return (StatusCode::BAD_REQUEST, "No file uploaded").into_response();
    };
    if file_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "No selected file").into_response();
    }
    let Some(safe_name) = Path::new(&file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
    else {
        return (StatusCode::BAD_REQUEST, "Invalid file name").into_response();
    };

    let _guard = state.analysis_lock.lock().await;

    let stored = state.upload_dir.join(&safe_name);
    if let Err(e) = save_upload(&state.upload_dir, &stored, &data).await {
        error!("Failed to store upload {}: {}", stored.display(), e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload").into_response();
    }
    info!("Stored upload {} ({} bytes)", stored.display(), data.len());

    let output = match analyze(
        stored.to_string_lossy(),
        Arc::clone(&state.captioner),
        &state.config,
    )
    .await
    {
        Ok(output) => output,
        Err(e) => return analysis_error(&state, e),
    };

    if let Err(e) = state.sink.write(&output.result).await {
        return analysis_error(&state, e);
    }

    state.render(&IndexView::from_result(&output.result))
}

async fn save_upload(dir: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, data).await
}

fn analysis_error(state: &AppState, e: AnalysisError) -> Response {
    let status = if e.is_document_error() {
        warn!("Rejected upload: {}", e);
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        error!("Analysis failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let mut response = state.render(&IndexView::error(e.to_string()));
    *response.status_mut() = status;
    response
}

async fn download(State(state): State<AppState>) -> Response {
    let path = state.sink.output_path();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::NOT_FOUND, "No results available").into_response(),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::config::DEFAULT_OUTPUT_PATH.to_string());

    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn serve_image(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Response {
    let Some(path) = state.sink.image_file(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pdf2quiz",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
