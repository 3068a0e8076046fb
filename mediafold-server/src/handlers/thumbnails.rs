use axum::{
    Json,
    extract::{Path, State},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use mediafold_core::{Artifact, CacheStatus, MediaKind, SourceId};
use serde_json::{Value, json};

use super::parse_source;
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

fn video_source(raw: &str) -> AppResult<SourceId> {
    let source = parse_source(raw)?;
    if MediaKind::from_path(source.as_str()) != Some(MediaKind::Video) {
        return Err(AppError::bad_request(
            "Thumbnails are only generated for video files",
        ));
    }
    Ok(source)
}

fn data_url(artifact: &Artifact) -> AppResult<String> {
    match artifact {
        Artifact::ThumbnailImage(image) => Ok(format!(
            "data:{};base64,{}",
            image.mime,
            STANDARD.encode(&image.bytes)
        )),
        Artifact::TranscodedFile(_) => {
            Err(AppError::internal("thumbnail cache holds a non-image artifact"))
        }
    }
}

fn status_body(status: &CacheStatus) -> AppResult<Value> {
    Ok(match status {
        CacheStatus::Ready(artifact) => json!({
            "status": "ready",
            "thumbnail": data_url(artifact)?,
        }),
        other => json!({ "status": other.as_str() }),
    })
}

/// Cached thumbnail, or queue one and report `processing`.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Json<Value>> {
    let source = video_source(&path)?;
    let status = state.thumbnails().enqueue(&source).await?;
    Ok(Json(status_body(&status)?))
}

pub async fn thumbnail_status(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Json<Value>> {
    let source = video_source(&path)?;
    let status = state.thumbnails().status(&source).await?;
    Ok(Json(status_body(&status)?))
}

pub async fn cache_status(State(state): State<AppState>) -> Json<Value> {
    let stats = state.thumbnails().stats();
    Json(json!({
        "cache_size": stats.cache_size,
        "queue_size": stats.queue_size,
        "processing_count": stats.processing_count,
        "cache_keys": stats.cache_keys,
        "current_folder": state.thumbnails().active_folder(),
    }))
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let counts = state.thumbnails().clear();
    Json(json!({
        "cleared_entries": counts.entries,
        "cleared_processing": counts.in_flight,
    }))
}
