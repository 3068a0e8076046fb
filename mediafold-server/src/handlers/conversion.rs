use axum::{
    Json,
    body::Body,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use mediafold_core::{
    Artifact, CacheStatus, DerivativePipeline, SourceId, StreamingTranscoder,
    media::needs_conversion,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use super::parse_source;
use crate::infra::{
    app_state::{AppState, ConversionService},
    errors::{AppError, AppResult},
};

fn convertible_source(raw: &str) -> AppResult<SourceId> {
    let source = parse_source(raw)?;
    if !needs_conversion(source.as_str()) {
        return Err(AppError::bad_request("File does not need conversion"));
    }
    Ok(source)
}

/// Browser-playable MP4 for a legacy container.
pub async fn convert(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> AppResult<Response> {
    let source = convertible_source(&path)?;
    match state.conversion() {
        ConversionService::Stream(transcoder) => {
            stream_conversion(&state, transcoder, &source).await
        }
        ConversionService::Queue(pipeline) => {
            queued_conversion(pipeline, &source, request).await
        }
    }
}

async fn stream_conversion(
    state: &AppState,
    transcoder: &StreamingTranscoder,
    source: &SourceId,
) -> AppResult<Response> {
    let input = state.library().resolve(source).await?;
    let session = transcoder.start(&input).await?;
    debug!(source = %source, pid = session.pid(), "streaming conversion");

    // The body owns the session: a client disconnect drops it, which
    // kills the process and removes the scratch file.
    let body = Body::from_stream(session.into_stream());
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::ACCEPT_RANGES, "none"),
        ],
        body,
    )
        .into_response())
}

async fn queued_conversion(
    pipeline: &DerivativePipeline,
    source: &SourceId,
    request: Request,
) -> AppResult<Response> {
    match pipeline.enqueue(source).await? {
        CacheStatus::Ready(artifact) => match artifact.as_ref() {
            Artifact::TranscodedFile(file) => {
                // Scratch files carry an .mp4 suffix, so the guessed type
                // is video/mp4.
                match ServeFile::new(file.path()).oneshot(request).await {
                    Ok(response) => Ok(response.into_response()),
                    Err(never) => match never {},
                }
            }
            Artifact::ThumbnailImage(_) => Err(AppError::internal(
                "conversion cache holds a non-video artifact",
            )),
        },
        CacheStatus::Processing | CacheStatus::NotStarted => {
            let status = if pipeline.is_processing(source) {
                "processing"
            } else {
                "queued"
            };
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": status,
                    "message": "Conversion in progress; retry shortly",
                })),
            )
                .into_response())
        }
    }
}

pub async fn conversion_status(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Json<Value>> {
    let source = convertible_source(&path)?;
    let Some(pipeline) = state.conversion().pipeline() else {
        return Ok(Json(json!({
            "status": "on_demand",
            "strategy": "stream",
        })));
    };

    let status = pipeline.status(&source).await?;
    let mut body = json!({
        "status": status.as_str(),
        "strategy": "queue",
    });
    if let CacheStatus::Ready(artifact) = &status {
        body["size"] = json!(artifact.size());
    }
    Ok(Json(body))
}

pub async fn cache_status(State(state): State<AppState>) -> Json<Value> {
    let strategy = state.conversion().strategy().as_str();
    match state.conversion().pipeline() {
        Some(pipeline) => {
            let stats = pipeline.stats();
            Json(json!({
                "strategy": strategy,
                "cache_size": stats.cache_size,
                "queue_size": stats.queue_size,
                "processing_count": stats.processing_count,
                "cache_keys": stats.cache_keys,
            }))
        }
        None => Json(json!({
            "strategy": strategy,
            "cache_size": 0,
            "queue_size": 0,
            "processing_count": 0,
            "cache_keys": [],
        })),
    }
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let counts = state
        .conversion()
        .pipeline()
        .map(DerivativePipeline::clear)
        .unwrap_or_default();
    Json(json!({
        "cleared_entries": counts.entries,
        "cleared_processing": counts.in_flight,
    }))
}
