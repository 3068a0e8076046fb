use axum::{Json, extract::State};
use chrono::Utc;
use mediafold_core::DerivativePipeline;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "mediafold media server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn pipeline_summary(pipeline: &DerivativePipeline) -> Value {
    let stats = pipeline.stats();
    json!({
        "queue_size": stats.queue_size,
        "processing_count": stats.processing_count,
        "cache_size": stats.cache_size,
        "workers": stats.workers,
        "active_workers": stats.active_workers,
        "completed": stats.completed,
        "failed": stats.failed,
        "timed_out": stats.timed_out,
    })
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let tool = state.tool();
    let thumbnails = state.thumbnails();
    let uptime = (Utc::now() - state.started_at()).num_seconds().max(0);

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
        "media_root": state.config().media_root().display().to_string(),
        "media_root_exists": state.config().media_root().is_dir(),
        "ffmpeg_available": tool.available,
        "ffmpeg_version": tool.version,
        "current_folder": thumbnails.active_folder(),
        "conversion_strategy": state.conversion().strategy().as_str(),
        "thumbnails": pipeline_summary(thumbnails),
        "conversions": state.conversion().pipeline().map(pipeline_summary),
    }))
}
