use std::sync::Arc;

use anyhow::Context;
use mediafold_config::{Config, ConversionStrategy};
use mediafold_core::{
    ConversionProducer, DerivativePipeline, FfmpegTool, PipelineSettings,
    PriorityTiers, StreamingTranscoder, ThumbnailProducer, ThumbnailSettings,
};
use tracing::{info, warn};

use super::app_state::{AppState, ConversionService};

pub fn priority_tiers(config: &Config) -> PriorityTiers {
    PriorityTiers {
        active: config.priority.active,
        background: config.priority.background,
    }
}

pub fn thumbnail_settings(config: &Config) -> ThumbnailSettings {
    ThumbnailSettings {
        width: config.thumbnails.width,
        attempt_timeout: config.thumbnails.attempt_timeout,
        seek_offset: config.thumbnails.seek_offset,
        fallback_seek_offset: config.thumbnails.fallback_seek_offset,
    }
}

/// Probe the tool, build both pipelines and start their dispatchers.
///
/// A missing ffmpeg is logged, not fatal: listings and originals keep
/// working and derivative requests fail individually.
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    config
        .ensure_directories()
        .context("failed to create scratch directory")?;

    let tool = FfmpegTool::new(&config.ffmpeg.ffmpeg_path);
    let status = tool.probe().await;
    match &status.version {
        Some(version) => info!(path = %status.path, %version, "ffmpeg available"),
        None => warn!(
            path = %status.path,
            "ffmpeg not available; thumbnails and conversions will fail"
        ),
    }

    let tiers = priority_tiers(&config);

    let thumbnails = DerivativePipeline::new(
        PipelineSettings {
            name: "thumbnails",
            media_root: config.media_root().to_path_buf(),
            workers: config.thumbnails.workers,
            job_timeout: config.thumbnails.job_timeout,
            tiers,
        },
        Arc::new(ThumbnailProducer::new(
            tool.clone(),
            thumbnail_settings(&config),
        )),
    );

    let conversion = match config.conversion.strategy {
        ConversionStrategy::Stream => ConversionService::Stream(
            StreamingTranscoder::new(
                Arc::new(tool.clone()),
                config.scratch_dir(),
                config.conversion.poll_interval,
            ),
        ),
        ConversionStrategy::Queue => {
            ConversionService::Queue(DerivativePipeline::new(
                PipelineSettings {
                    name: "conversions",
                    media_root: config.media_root().to_path_buf(),
                    workers: config.conversion.workers,
                    job_timeout: config.conversion.job_timeout,
                    tiers,
                },
                Arc::new(ConversionProducer::new(
                    tool.clone(),
                    config.scratch_dir(),
                )),
            ))
        }
    };

    let state = AppState::new(Arc::new(config), thumbnails, conversion, status);
    start_pipelines(&state);
    Ok(state)
}

pub fn start_pipelines(state: &AppState) {
    state.thumbnails().start();
    if let Some(pipeline) = state.conversion().pipeline() {
        pipeline.start();
    }
    info!(
        thumbnail_workers = state.thumbnails().workers(),
        conversion_strategy = %state.conversion().strategy(),
        "derivative pipelines started"
    );
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
