use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{parse_bool_var, parse_csv_var, parse_var};

use super::ConversionStrategy;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub media: FileMediaConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub ffmpeg: FileFfmpegConfig,
    #[serde(default)]
    pub thumbnails: FileThumbnailConfig,
    #[serde(default)]
    pub conversion: FileConversionConfig,
    #[serde(default)]
    pub priority: FilePriorityConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMediaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFfmpegConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
}

/// Durations are human strings such as `"30s"` or `"250ms"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileThumbnailConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_seek_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileConversionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ConversionStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePriorityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<bool>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub media_root: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub ffmpeg_path: Option<String>,
    pub thumbnail_workers: Option<usize>,
    pub thumbnail_job_timeout: Option<String>,
    pub thumbnail_attempt_timeout: Option<String>,
    pub thumbnail_width: Option<u32>,
    pub conversion_strategy: Option<String>,
    pub conversion_workers: Option<usize>,
    pub conversion_job_timeout: Option<String>,
    pub conversion_poll_interval: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub cors_allow_credentials: Option<bool>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("MEDIAFOLD_CONFIG")
                .ok()
                .map(PathBuf::from),
            server_host: std::env::var("SERVER_HOST").ok(),
            server_port: parse_var("SERVER_PORT"),
            // PHOTOS_DIR is the historical name; MEDIA_ROOT wins when both are set.
            media_root: std::env::var("MEDIA_ROOT")
                .or_else(|_| std::env::var("PHOTOS_DIR"))
                .ok()
                .map(PathBuf::from),
            scratch_dir: std::env::var("SCRATCH_DIR").ok().map(PathBuf::from),
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok(),
            thumbnail_workers: parse_var("THUMBNAIL_WORKERS"),
            thumbnail_job_timeout: std::env::var("THUMBNAIL_JOB_TIMEOUT").ok(),
            thumbnail_attempt_timeout: std::env::var(
                "THUMBNAIL_ATTEMPT_TIMEOUT",
            )
            .ok(),
            thumbnail_width: parse_var("THUMBNAIL_WIDTH"),
            conversion_strategy: std::env::var("CONVERSION_STRATEGY").ok(),
            conversion_workers: parse_var("CONVERSION_WORKERS"),
            conversion_job_timeout: std::env::var("CONVERSION_JOB_TIMEOUT")
                .ok(),
            conversion_poll_interval: std::env::var(
                "CONVERSION_POLL_INTERVAL",
            )
            .ok(),
            cors_allowed_origins: parse_csv_var("CORS_ALLOWED_ORIGINS"),
            cors_allow_credentials: parse_bool_var("CORS_ALLOW_CREDENTIALS"),
            dev_mode: parse_bool_var("DEV_MODE"),
        }
    }
}
