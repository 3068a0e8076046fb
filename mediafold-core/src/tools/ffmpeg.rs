use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    artifact::{Artifact, ThumbnailImage, TranscodedFile},
    error::{PipelineError, Result},
    media::{MediaKind, needs_conversion},
    producer::DerivativeProducer,
    source::SourceId,
    stream::TranscodeCommand,
    tools::spawn_error,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of the startup readiness probe.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub path: String,
    pub available: bool,
    pub version: Option<String>,
}

/// Thin wrapper around an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    path: PathBuf,
}

impl FfmpegTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn program(&self) -> String {
        self.path.display().to_string()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.arg("-hide_banner")
            .args(["-loglevel", "error"])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Run `<ffmpeg> -version`. Never fails; absence is reported in the
    /// returned status.
    pub async fn probe(&self) -> ToolStatus {
        let mut cmd = Command::new(&self.path);
        cmd.arg("-version").stdin(Stdio::null()).kill_on_drop(true);

        let version = match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|line| line.trim().to_string())
            }
            Ok(Ok(output)) => {
                warn!(path = %self.path.display(), status = %output.status, "ffmpeg -version failed");
                None
            }
            Ok(Err(err)) => {
                warn!(path = %self.path.display(), error = %err, "ffmpeg not runnable");
                None
            }
            Err(_) => {
                warn!(path = %self.path.display(), "ffmpeg -version timed out");
                None
            }
        };

        ToolStatus {
            path: self.program(),
            available: version.is_some(),
            version,
        }
    }

    pub(crate) fn thumbnail_command(
        &self,
        input: &Path,
        seek: Duration,
        width: u32,
    ) -> Command {
        let mut cmd = self.command();
        cmd.arg("-ss")
            .arg(format!("{:.3}", seek.as_secs_f64()))
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1"])
            .arg("-vf")
            .arg(format!(
                "scale={width}:{width}:force_original_aspect_ratio=decrease"
            ))
            .args(["-f", "image2pipe", "-c:v", "mjpeg", "-q:v", "4", "pipe:1"]);
        cmd
    }

    /// Grab one frame at `seek` as JPEG, giving up after `limit`.
    pub async fn extract_frame(
        &self,
        input: &Path,
        seek: Duration,
        width: u32,
        limit: Duration,
    ) -> Result<Bytes> {
        let mut cmd = self.thumbnail_command(input, seek, width);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Ok(result) => result.map_err(|err| spawn_error(&self.program(), err))?,
            Err(_) => {
                return Err(PipelineError::Timeout {
                    operation: "frame extraction",
                    elapsed: limit,
                });
            }
        };
        check_output(&output)?;

        if output.stdout.is_empty() {
            return Err(PipelineError::tool_failure("ffmpeg", "no frame produced"));
        }
        Ok(Bytes::from(output.stdout))
    }

    pub(crate) fn conversion_command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(input)
            .args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "23"])
            .args(["-c:a", "aac", "-b:a", "128k"])
            .args(["-movflags", "+faststart", "-f", "mp4", "-y"])
            .arg(output);
        cmd
    }

    /// Convert `input` to a browser-playable MP4 at `output`.
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.conversion_command(input, output);
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let result = cmd
            .output()
            .await
            .map_err(|err| spawn_error(&self.program(), err))?;
        check_output(&result)
    }
}

/// Fragmented MP4 so the file is playable while it is still being written.
impl TranscodeCommand for FfmpegTool {
    fn program(&self) -> String {
        FfmpegTool::program(self)
    }

    fn build(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(input)
            .args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "23"])
            .args(["-c:a", "aac", "-b:a", "128k"])
            .args([
                "-movflags",
                "frag_keyframe+empty_moov+default_base_moof",
                "-f",
                "mp4",
                "-y",
            ])
            .arg(output);
        cmd
    }
}

fn check_output(output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().last().unwrap_or("").trim();
    Err(PipelineError::tool_failure(
        "ffmpeg",
        format!("exited with {}: {last}", output.status),
    ))
}

#[derive(Debug, Clone, Copy)]
pub struct ThumbnailSettings {
    pub width: u32,
    /// Budget for each individual ffmpeg attempt.
    pub attempt_timeout: Duration,
    pub seek_offset: Duration,
    pub fallback_seek_offset: Duration,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            width: 320,
            attempt_timeout: Duration::from_secs(3),
            seek_offset: Duration::from_secs(5),
            fallback_seek_offset: Duration::ZERO,
        }
    }
}

/// Video thumbnails as JPEG stills.
///
/// Short clips have no frame at the default seek point, so an empty or
/// failed first attempt is retried once at the fallback offset.
#[derive(Debug, Clone)]
pub struct ThumbnailProducer {
    tool: FfmpegTool,
    settings: ThumbnailSettings,
}

impl ThumbnailProducer {
    pub fn new(tool: FfmpegTool, settings: ThumbnailSettings) -> Self {
        Self { tool, settings }
    }
}

#[async_trait]
impl DerivativeProducer for ThumbnailProducer {
    fn name(&self) -> &'static str {
        "thumbnail"
    }

    async fn produce(&self, source: &SourceId, path: &Path) -> Result<Artifact> {
        if MediaKind::from_path(path) != Some(MediaKind::Video) {
            return Err(PipelineError::Unsupported(source.to_string()));
        }
        let ThumbnailSettings {
            width,
            attempt_timeout,
            seek_offset,
            fallback_seek_offset,
        } = self.settings;

        let first = self
            .tool
            .extract_frame(path, seek_offset, width, attempt_timeout)
            .await;
        let bytes = match first {
            Ok(bytes) => bytes,
            Err(err) if err.is_retryable() && fallback_seek_offset != seek_offset => {
                debug!(
                    source = %source,
                    error = %err,
                    seek = ?fallback_seek_offset,
                    "retrying thumbnail at fallback offset"
                );
                self.tool
                    .extract_frame(path, fallback_seek_offset, width, attempt_timeout)
                    .await?
            }
            Err(err) => return Err(err),
        };

        Ok(Artifact::ThumbnailImage(ThumbnailImage::jpeg(bytes)))
    }
}

/// Background conversion into an owned scratch file.
#[derive(Debug, Clone)]
pub struct ConversionProducer {
    tool: FfmpegTool,
    scratch: PathBuf,
}

impl ConversionProducer {
    pub fn new(tool: FfmpegTool, scratch: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            scratch: scratch.into(),
        }
    }
}

#[async_trait]
impl DerivativeProducer for ConversionProducer {
    fn name(&self) -> &'static str {
        "conversion"
    }

    async fn produce(&self, source: &SourceId, path: &Path) -> Result<Artifact> {
        if !needs_conversion(path) {
            return Err(PipelineError::Unsupported(source.to_string()));
        }

        tokio::fs::create_dir_all(&self.scratch).await?;
        // Dropped (and deleted) if the job fails or times out.
        let output = tempfile::Builder::new()
            .prefix("convert-")
            .suffix(".mp4")
            .tempfile_in(&self.scratch)?
            .into_temp_path();

        self.tool.convert(path, &output).await?;

        let size = tokio::fs::metadata(&output).await?.len();
        if size == 0 {
            return Err(PipelineError::tool_failure("ffmpeg", "empty conversion output"));
        }
        info!(source = %source, size, "conversion finished");
        Ok(Artifact::TranscodedFile(TranscodedFile::new(output, size)))
    }
}
