use axum::{
    Json,
    extract::{Path, Request, State},
    response::{IntoResponse, Response},
};
use mediafold_core::{
    MediaKind, PipelineError, SourceId,
    media::{FolderSummary, MediaEntry},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use super::parse_source;
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Top-level folders. A missing media root lists as empty.
pub async fn list_folders(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<FolderSummary>>> {
    match state.library().list_folders().await {
        Ok(folders) => Ok(Json(folders)),
        Err(PipelineError::SourceNotFound(_)) => Ok(Json(Vec::new())),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct FolderListing {
    pub folder: SourceId,
    pub photos: Vec<MediaEntry>,
    pub total_count: usize,
}

async fn folder_listing(state: &AppState, folder: SourceId) -> AppResult<FolderListing> {
    let photos = match state.library().list_media(&folder).await {
        Ok(photos) => photos,
        Err(PipelineError::SourceNotFound(_)) => {
            return Err(AppError::not_found("Folder not found"));
        }
        Err(PipelineError::Io(err)) if err.kind() == std::io::ErrorKind::NotADirectory => {
            return Err(AppError::not_found("Folder not found"));
        }
        Err(err) => return Err(err.into()),
    };

    // Browsing a folder makes its thumbnails the most urgent work.
    state.thumbnails().set_active_folder(folder.clone());
    if let Some(pipeline) = state.conversion().pipeline() {
        pipeline.set_active_folder(folder.clone());
    }

    Ok(FolderListing {
        total_count: photos.len(),
        folder,
        photos,
    })
}

pub async fn list_root_photos(
    State(state): State<AppState>,
) -> AppResult<Json<FolderListing>> {
    Ok(Json(folder_listing(&state, SourceId::root()).await?))
}

pub async fn list_photos(
    State(state): State<AppState>,
    Path(folder): Path<String>,
) -> AppResult<Json<FolderListing>> {
    let folder = parse_source(&folder)?;
    Ok(Json(folder_listing(&state, folder).await?))
}

pub async fn set_current_folder(
    State(state): State<AppState>,
    Path(folder): Path<String>,
) -> AppResult<Json<Value>> {
    let folder = parse_source(&folder)?;
    let changed = state.thumbnails().set_active_folder(folder.clone());
    if let Some(pipeline) = state.conversion().pipeline() {
        pipeline.set_active_folder(folder.clone());
    }
    debug!(folder = %folder, changed, "current folder set");

    Ok(Json(json!({
        "current_folder": folder,
        "changed": changed,
    })))
}

/// Original file bytes, with range support.
pub async fn serve_photo(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> AppResult<Response> {
    let source = parse_source(&path)?;
    if MediaKind::from_path(source.as_str()).is_none() {
        return Err(AppError::bad_request("Unsupported file type"));
    }
    let resolved = state.library().resolve(&source).await?;
    let is_file = tokio::fs::metadata(&resolved)
        .await
        .is_ok_and(|meta| meta.is_file());
    if !is_file {
        return Err(AppError::not_found("File not found"));
    }

    match ServeFile::new(&resolved).oneshot(request).await {
        Ok(response) => Ok(response.into_response()),
        Err(never) => match never {},
    }
}
