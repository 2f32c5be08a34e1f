//! Web form: submit a URL and a quality preset, then fetch the result.
//!
//! Each download lands in its own job directory under the download root and is
//! deleted once it has been streamed back to the client. Jobs nobody collects
//! are swept after the retention window.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, Path as UrlPath, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServeArgs;
use crate::download::{download_preset, parse_media_url};
use crate::error::{FetchError, FFMPEG_NOT_INSTALLED};
use crate::quality::Quality;
use crate::streams::{fetch_catalog, Catalog};
use crate::tools::Toolchain;

const INDEX_TEMPLATE: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    tools: Arc<Toolchain>,
    download_dir: PathBuf,
}

impl AppState {
    pub fn new(tools: Toolchain, download_dir: PathBuf) -> Self {
        Self {
            tools: Arc::new(tools),
            download_dir,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    url: Option<String>,
    quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    message: String,
    job: Uuid,
    filename: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamsRequest {
    url: String,
}

/// Error body returned as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "File not found".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(_) => Self::bad_request(err.to_string()),
            other => Self::internal(other.user_message()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/check-ffmpeg", get(check_ffmpeg))
        .route("/download", post(download))
        .route("/get-file/{job}/{filename}", get(get_file))
        .route("/api/streams", post(list_streams))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the web form until the process is stopped.
pub async fn serve(tools: Toolchain, args: &ServeArgs) -> Result<()> {
    tokio::fs::create_dir_all(&args.download_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.download_dir.display()))?;

    if tools.ffmpeg_available() {
        info!("FFmpeg detected - all quality options available");
    } else {
        warn!("FFmpeg not detected - only single-file presets will work");
    }

    let retention = Duration::from_secs(args.retention);
    sweep_stale_jobs(&args.download_dir, retention).await;
    spawn_sweeper(args.download_dir.clone(), retention);

    let app = router(AppState::new(tools, args.download_dir.clone()));

    let listener = TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    info!("Server starting at http://{}", args.addr);

    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}

pub fn render_index() -> String {
    let options: String = Quality::ALL
        .iter()
        .map(|q| {
            format!(
                "      <option value=\"{}\" data-ffmpeg=\"{}\">{}</option>\n",
                q.as_str(),
                q.requires_ffmpeg(),
                q.label()
            )
        })
        .collect();
    INDEX_TEMPLATE.replace("{{options}}\n", &options)
}

async fn index() -> Html<String> {
    Html(render_index())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn check_ffmpeg(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "available": state.tools.ffmpeg_available() }))
}

async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let Json(req) = payload?;
    let raw_url = req.url.as_deref().map(str::trim).unwrap_or_default();
    if raw_url.is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }
    let url = parse_media_url(raw_url)?;

    let quality = match req.quality.as_deref().map(str::trim) {
        None | Some("") => Quality::default(),
        Some(name) => name
            .parse::<Quality>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
    };

    if quality.requires_ffmpeg() && !state.tools.ffmpeg_available() {
        return Err(ApiError::bad_request(FFMPEG_NOT_INSTALLED));
    }

    let job = Uuid::new_v4();
    let job_dir = state.download_dir.join(job.to_string());

    let path = match download_preset(&state.tools, &url, quality, &job_dir).await {
        Ok(path) => path,
        Err(e) => {
            error!("Download of {} failed: {}", url, e);
            remove_job_dir(&job_dir).await;
            return Err(e.into());
        }
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ApiError::internal("Downloaded file has no usable name"))?;

    Ok(Json(DownloadResponse {
        message: "Download completed successfully!".to_string(),
        job,
        download_url: format!("/get-file/{job}/{}", urlencoding::encode(&filename)),
        filename,
    }))
}

async fn get_file(
    State(state): State<AppState>,
    UrlPath((job, filename)): UrlPath<(String, String)>,
) -> Result<Response, ApiError> {
    let job: Uuid = job.parse().map_err(|_| ApiError::not_found())?;
    if !is_plain_file_name(&filename) {
        return Err(ApiError::not_found());
    }

    let job_dir = state.download_dir.join(job.to_string());
    let path = job_dir.join(&filename);

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to open {}: {}", path.display(), e);
        }
        ApiError::not_found()
    })?;
    let metadata = file.metadata().await.map_err(|_| ApiError::not_found())?;
    if !metadata.is_file() {
        return Err(ApiError::not_found());
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type_for(&filename)));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&filename))
            .map_err(|_| ApiError::internal("Failed to build download headers"))?,
    );

    // The file handle is dropped once the reader is drained, then the job is removed.
    let cleanup = futures::stream::once(async move {
        remove_job_dir(&job_dir).await;
        None::<std::io::Result<Bytes>>
    })
    .filter_map(futures::future::ready);
    let body = Body::from_stream(ReaderStream::new(file).chain(cleanup));

    info!("Serving {} ({} bytes)", path.display(), metadata.len());
    Ok((headers, body).into_response())
}

async fn list_streams(
    State(state): State<AppState>,
    payload: Result<Json<StreamsRequest>, JsonRejection>,
) -> Result<Json<Catalog>, ApiError> {
    let Json(req) = payload?;
    let catalog = fetch_catalog(&state.tools, req.url.trim()).await?;
    Ok(Json(catalog))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "opus" | "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// `attachment` disposition with an ASCII fallback and the UTF-8 name.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let ascii = ascii.trim();
    let ascii = if ascii.is_empty() { "download.bin" } else { ascii };

    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

async fn remove_job_dir(job_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to clean up {}: {}", job_dir.display(), e);
        }
    }
}

/// Remove job directories older than `older_than`.
pub async fn sweep_stale_jobs(download_dir: &Path, older_than: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(download_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot scan {}: {}", download_dir.display(), e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_job = entry
            .file_name()
            .to_str()
            .is_some_and(|name| Uuid::parse_str(name).is_ok());
        if !is_job {
            continue;
        }

        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();

        if metadata.is_dir() && age >= older_than {
            remove_job_dir(&entry.path()).await;
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Swept {} stale download(s)", removed);
    }
    removed
}

fn spawn_sweeper(download_dir: PathBuf, retention: Duration) {
    if retention.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retention);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_stale_jobs(&download_dir, retention).await;
        }
    });
}
