use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::index::FileRecord;
use crate::pipeline::{AudioBody, AudioResponse};
use crate::query::{parse_date_param, FileQuery, RecordingsParams};
use crate::range::{content_range, unsatisfied_range, ByteRange};
use crate::services::ArchiveServices;

type AppState = Arc<ArchiveServices>;

/// Run the HTTP API until Ctrl-C, then close the services
pub async fn serve_archive(
    config: &ArchiveConfig,
    services: Arc<ArchiveServices>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let port = config.api_port;

    info!("Starting call archive API");
    info!("Database: {}", config.database_path.display());
    info!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    info!("Endpoints:");
    info!("  GET  /recordings?dateStart&dateEnd&offset&limit&...  - Filtered recording list");
    info!("  GET  /recordings/{{dateFolder}}/{{filename}}  - Playable WAV (Range supported)");
    info!("  GET  /audio/{{*path}}  - Playable WAV (Range supported)");
    info!("  GET  /waveform/{{*path}}  - Waveform envelope");
    info!("  POST /sync  - Sync index (optional dateRange body)");
    info!("  GET  /admin/stats  - Index statistics");
    info!("  GET  /health  - Health check");

    let periodic = if config.sync.periodic {
        Some(services.sync.clone().spawn_periodic_sync(config.sync.interval()))
    } else {
        info!("Periodic sync disabled");
        None
    };

    let app = create_router(services.clone());
    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
        .await
        .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    if let Some(handle) = periodic {
        handle.abort();
    }
    services.close().await;
    Ok(())
}

/// API routes with permissive CORS
pub fn create_router(services: Arc<ArchiveServices>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ]);

    Router::new()
        .route("/recordings", get(recordings_handler))
        .route("/recordings/{date_folder}/{filename}", get(recording_audio_handler))
        .route("/audio/{*path}", get(audio_handler))
        .route("/waveform/{*path}", get(waveform_handler))
        .route("/sync", post(sync_handler))
        .route("/admin/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(services)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordingsResponse {
    files: Vec<FileRecord>,
    total_count: u64,
    offset: u64,
    limit: u64,
    has_more: bool,
}

async fn recordings_handler(
    State(state): State<AppState>,
    Query(params): Query<RecordingsParams>,
) -> Result<Json<RecordingsResponse>, ArchiveError> {
    let query = FileQuery::from_params(&params);
    let page = state.index.query(&query).await?;

    Ok(Json(RecordingsResponse {
        files: page.rows,
        total_count: page.total_count,
        offset: query.offset,
        limit: query.limit.unwrap_or(page.total_count),
        has_more: page.has_more,
    }))
}

async fn recording_audio_handler(
    State(state): State<AppState>,
    Path((date_folder, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ArchiveError> {
    let file_path = validate_file_path(&format!("{}/{}", date_folder, filename))?;
    stream_audio(&state, &file_path, &headers).await
}

async fn audio_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ArchiveError> {
    let file_path = validate_file_path(&path)?;
    stream_audio(&state, &file_path, &headers).await
}

async fn stream_audio(state: &AppState, file_path: &str, headers: &HeaderMap) -> Result<Response, ArchiveError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let parsed = ByteRange::parse(v);
            if parsed.is_none() {
                warn!("Ignoring malformed Range header '{}' for {}", v, file_path);
            }
            parsed
        });

    let audio = state.pipeline.serve_audio(file_path, range).await?;
    Ok(audio_response(audio))
}

fn audio_response(audio: AudioResponse) -> Response {
    let status = if audio.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, audio.content_length())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", urlencoding::encode(audio.filename())),
        )
        .header(header::CACHE_CONTROL, "private, max-age=86400");

    if let Some(range) = &audio.range {
        builder = builder.header(header::CONTENT_RANGE, content_range(range, audio.total_length));
    }
    if let Some(modified) = audio.last_modified {
        builder = builder.header(
            header::LAST_MODIFIED,
            httpdate::fmt_http_date(SystemTime::from(modified)),
        );
    }

    let body = match audio.body {
        AudioBody::Buffered(data) => Body::from(data),
        AudioBody::Stream(stream) => Body::from_stream(stream),
    };

    builder.body(body).unwrap_or_else(|e| {
        error!("Failed to build audio response: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

async fn waveform_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ArchiveError> {
    let file_path = validate_file_path(&path)?;
    let waveform = state.pipeline.waveform(&file_path).await?;
    Ok(Json(waveform).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest {
    date_range: Option<SyncDateRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    success: bool,
    indexed_files: usize,
    /// Seconds
    duration: f64,
    failed_days: Vec<String>,
}

#[derive(Serialize)]
struct SyncFailure {
    success: bool,
    error: String,
}

fn sync_failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(SyncFailure {
            success: false,
            error: message,
        }),
    )
        .into_response()
}

/// Range sync with a `dateRange` body, full sync without one
async fn sync_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequest { date_range: None }
    } else {
        match serde_json::from_slice::<SyncRequest>(&body) {
            Ok(req) => req,
            Err(e) => return sync_failure(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)),
        }
    };

    let result = match request.date_range {
        Some(range) => {
            let start = parse_date_param(&range.start_date);
            let end = parse_date_param(&range.end_date);
            let (Some(start), Some(end)) = (start, end) else {
                return sync_failure(
                    StatusCode::BAD_REQUEST,
                    format!(
                        "Invalid date range: {} to {}",
                        range.start_date, range.end_date
                    ),
                );
            };
            info!("Sync requested for {} to {}", start, end);
            state.sync.sync_date_range(start, end).await
        }
        None => {
            info!("Full sync requested");
            state.sync.sync_all().await
        }
    };

    match result {
        Ok(report) => Json(SyncResponse {
            success: true,
            indexed_files: report.indexed_count,
            duration: report.duration_seconds,
            failed_days: report.failed_days,
        })
        .into_response(),
        Err(ArchiveError::InvalidRequest(msg)) => sync_failure(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            error!("Sync failed: {}", e);
            sync_failure(StatusCode::INTERNAL_SERVER_ERROR, e.category().to_string())
        }
    }
}

async fn stats_handler(State(state): State<AppState>) -> Result<Response, ArchiveError> {
    let stats = state.index.stats().await?;
    Ok(Json(stats).into_response())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Normalize a recording path from the URL, rejecting traversal segments
fn validate_file_path(path: &str) -> Result<String, ArchiveError> {
    let path = path.trim_start_matches('/');
    if path.is_empty()
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ArchiveError::InvalidRequest(format!(
            "invalid recording path '{}'",
            path
        )));
    }
    Ok(path.to_string())
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    stage: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
}

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let status = match &self {
            ArchiveError::NotFound(_) => StatusCode::NOT_FOUND,
            ArchiveError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ArchiveError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("[{}] {}", self.stage(), self);
        }

        let body = ErrorBody {
            error: self.category(),
            stage: self.stage(),
            key: self.key(),
        };
        let mut response = (status, Json(body)).into_response();

        if let ArchiveError::RangeNotSatisfiable { length } = &self {
            if let Ok(value) = HeaderValue::from_str(&unsatisfied_range(*length)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            response
                .headers_mut()
                .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }
        response
    }
}
