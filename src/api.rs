// HTTP API - search, download, downloads listing, lyrics and health

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::downloader::search::DEFAULT_RESULTS;
use crate::downloader::{
    tools, DownloadError, Downloader, Lyrics, LyricsProvider, OutputKind, SearchProvider,
    SourceLocator, VideoSummary,
};

#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<Downloader>,
    pub search: Arc<dyn SearchProvider>,
    pub lyrics: Arc<dyn LyricsProvider>,
    pub download_dir: PathBuf,
    /// Probed by `/api/health`
    pub ytdlp_program: PathBuf,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: Option<&'static str>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            kind: None,
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        let status = match &err {
            DownloadError::InvalidLocator(_) => StatusCode::BAD_REQUEST,
            DownloadError::ToolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Full detail (stderr, paths) stays in the server log
        tracing::error!("[Api] {} ({})", err, err.kind());
        Self {
            status,
            message: err.user_message(),
            kind: Some(err.kind()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.message,
        });
        if let Some(kind) = self.kind {
            body["kind"] = json!(kind);
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    let downloads = ServeDir::new(&state.download_dir);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", get(search_query).post(search_body))
        .route("/api/download", post(download))
        .route("/api/downloads", get(list_downloads))
        .route("/api/lyrics", get(lyrics))
        .nest_service("/downloads", downloads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ytdlp = tools::tool_info(&state.ytdlp_program).await;
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(json!({
        "status": "Server is running!",
        "timestamp": timestamp,
        "ytdlp": ytdlp,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    #[serde(rename = "maxResults")]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: Option<String>,
    #[serde(rename = "maxResults")]
    max_results: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    results: Vec<VideoSummary>,
}

async fn search_query(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    run_search(&state, params.q, params.max_results).await
}

async fn search_body(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    run_search(&state, request.query, request.max_results).await
}

async fn run_search(
    state: &AppState,
    query: Option<String>,
    max_results: Option<usize>,
) -> ApiResult<Json<SearchResponse>> {
    let query = query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(ApiError::bad_request("Query is required"));
    }

    let results = state
        .search
        .search(&query, max_results.unwrap_or(DEFAULT_RESULTS))
        .await?;
    if results.is_empty() {
        return Err(ApiError::not_found("No videos found for this search term"));
    }

    Ok(Json(SearchResponse {
        success: true,
        results,
    }))
}

fn default_format() -> String {
    "mp3".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadRequest {
    url: Option<String>,
    video_id: Option<String>,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    include_lyrics: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadResponse {
    success: bool,
    file_path: String,
    filename: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lyrics: Option<Lyrics>,
}

async fn download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let raw = request
        .url
        .or(request.video_id)
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;
    let locator = SourceLocator::parse(&raw)?;
    let kind = OutputKind::from_format(&request.format);

    tracing::info!("[Api] Starting {} download for {}", kind, locator);

    // Dropping the handler (client went away) cancels the running yt-dlp
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let artifact = state
        .downloader
        .download_locator(&locator, kind, &state.download_dir, &cancel)
        .await?;
    let filename = artifact.file_name();

    let lyrics = if request.include_lyrics {
        let title = title_from_file_name(&filename, locator.video_id());
        match state.lyrics.lookup_title(&title).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("[Api] Lyrics lookup for \"{}\" failed: {}", title, e);
                None
            }
        }
    } else {
        None
    };

    Ok(Json(DownloadResponse {
        success: true,
        file_path: format!("/downloads/{}", filename),
        message: format!("{} download completed successfully!", kind.extension().to_uppercase()),
        filename,
        lyrics,
    }))
}

/// Recover a display title from `<id>-Some_Title.ext`.
pub fn title_from_file_name(file_name: &str, video_id: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let prefix = format!("{}-", video_id);
    let title = stem.strip_prefix(&prefix).unwrap_or(&stem);
    title.replace('_', " ").trim().to_string()
}

#[derive(Debug, Serialize)]
struct DownloadEntry {
    name: String,
    url: String,
    #[serde(rename = "type")]
    kind: String,
}

async fn list_downloads(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let mut entries = match tokio::fs::read_dir(&state.download_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(json!({ "files": [] })));
        }
        Err(e) => return Err(DownloadError::Io(e).into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(DownloadError::Io)? {
        let path = entry.path();
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext @ ("mp3" | "mp4")) => ext.to_string(),
            _ => continue,
        };
        let name = entry.file_name().to_string_lossy().to_string();
        files.push(DownloadEntry {
            url: format!("/downloads/{}", name),
            name,
            kind: ext,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(json!({ "files": files })))
}

#[derive(Debug, Deserialize)]
struct LyricsParams {
    title: Option<String>,
}

async fn lyrics(
    State(state): State<AppState>,
    Query(params): Query<LyricsParams>,
) -> Json<serde_json::Value> {
    let title = params.title.unwrap_or_default();
    if title.trim().is_empty() {
        return Json(json!({ "lyrics": null }));
    }

    let lyrics = match state.lyrics.lookup_title(&title).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("[Api] Lyrics lookup for \"{}\" failed: {}", title, e);
            None
        }
    };
    Json(json!({ "lyrics": lyrics }))
}
