use std::time::Duration;

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8000;

pub const DEFAULT_MEDIA_ROOT: &str = "/photos";
pub const DEFAULT_SCRATCH_DIR: &str = "./cache/scratch";

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

pub const DEFAULT_THUMBNAIL_WORKERS: usize = 6;
pub const DEFAULT_THUMBNAIL_JOB_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_THUMBNAIL_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_THUMBNAIL_SEEK_OFFSET: Duration = Duration::from_secs(5);
pub const DEFAULT_THUMBNAIL_FALLBACK_SEEK_OFFSET: Duration = Duration::ZERO;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;

pub const DEFAULT_CONVERSION_WORKERS: usize = 1;
pub const DEFAULT_CONVERSION_JOB_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_CONVERSION_POLL_INTERVAL: Duration =
    Duration::from_millis(100);

pub const DEFAULT_ACTIVE_PRIORITY: u32 = 1;
pub const DEFAULT_BACKGROUND_PRIORITY: u32 = 10;
