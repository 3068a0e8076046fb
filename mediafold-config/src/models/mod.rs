pub mod sources;

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    pub ffmpeg: FfmpegConfig,
    pub thumbnails: ThumbnailConfig,
    pub conversion: ConversionConfig,
    pub priority: PriorityConfig,
    pub cors: CorsConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        self.cache.ensure_directories()
    }

    pub fn normalize_paths(&mut self) -> anyhow::Result<()> {
        self.cache.normalize_paths()
    }

    pub fn media_root(&self) -> &Path {
        &self.media.root
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.cache.scratch
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
}

/// Scratch storage for transformation output. Nothing under this directory
/// survives a restart in any meaningful way; the in-memory cache that refers
/// to it is rebuilt on demand.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub scratch: PathBuf,
}

impl CacheConfig {
    fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.scratch)?;
        Ok(())
    }

    fn normalize_paths(&mut self) -> anyhow::Result<()> {
        self.scratch = std::fs::canonicalize(&self.scratch)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_path: String,
}

/// Thumbnail pipeline tuning.
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    /// Upper bound on simultaneous extractions.
    pub workers: usize,
    /// Wall-clock budget for a whole job, retries included.
    pub job_timeout: Duration,
    /// Budget for a single ffmpeg invocation.
    pub attempt_timeout: Duration,
    pub seek_offset: Duration,
    /// Used when the first attempt fails or yields no bytes (short clips).
    pub fallback_seek_offset: Duration,
    pub width: u32,
}

#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub strategy: ConversionStrategy,
    pub workers: usize,
    pub job_timeout: Duration,
    /// Sleep between reads while tailing a file ffmpeg is still writing.
    pub poll_interval: Duration,
}

/// Which conversion path is live for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStrategy {
    /// Every conversion request launches ffmpeg and tails its output.
    #[default]
    Stream,
    /// Conversions run on a background pipeline and are served from cache.
    Queue,
}

impl ConversionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionStrategy::Stream => "stream",
            ConversionStrategy::Queue => "queue",
        }
    }
}

impl fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stream" | "streaming" => Ok(ConversionStrategy::Stream),
            "queue" | "queued" | "background" => Ok(ConversionStrategy::Queue),
            other => Err(format!("unknown conversion strategy '{other}'")),
        }
    }
}

/// Numeric priority tiers; lower values are serviced first.
#[derive(Debug, Clone, Copy)]
pub struct PriorityConfig {
    pub active: u32,
    pub background: u32,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    pub fn is_wildcard_included(&self) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| origin.trim() == "*")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
