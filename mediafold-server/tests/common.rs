use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum_test::TestServer;
use mediafold_config::{
    CacheConfig, Config, ConfigMetadata, ConversionConfig, ConversionStrategy,
    CorsConfig, FfmpegConfig, MediaConfig, PriorityConfig, ServerConfig,
    ThumbnailConfig,
};
use mediafold_core::{
    Artifact, DerivativePipeline, DerivativeProducer, PipelineError,
    PipelineSettings, PriorityTiers, SourceId, StreamingTranscoder,
    ThumbnailImage, ToolStatus, TranscodeCommand, TranscodedFile,
};
use mediafold_server::{
    AppState, ConversionService, create_app, infra::startup::start_pipelines,
};
use tempfile::TempDir;
use tokio::process::Command;

pub const FAKE_JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";
pub const FAKE_MP4: &[u8] = b"fake-mp4-conversion-output";

// Code is used by test modules, but not in this scope
#[allow(unused)]
#[derive(Debug)]
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub root: PathBuf,
    _tempdir: TempDir,
}

#[allow(unused)]
impl TestApp {
    /// Write `contents` to `relative` under the media root, creating parent
    /// folders as needed.
    pub fn write(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub async fn shutdown(self) {
        self.state.shutdown().await;
    }
}

/// Thumbnails without ffmpeg: every video yields the same tiny JPEG.
#[derive(Debug)]
pub struct FakeThumbnails;

#[async_trait]
impl DerivativeProducer for FakeThumbnails {
    fn name(&self) -> &'static str {
        "fake-thumbnails"
    }

    async fn produce(
        &self,
        _source: &SourceId,
        _path: &Path,
    ) -> mediafold_core::Result<Artifact> {
        Ok(Artifact::ThumbnailImage(ThumbnailImage::jpeg(FAKE_JPEG)))
    }
}

/// Conversions without ffmpeg: writes a fixed payload to a scratch file.
#[derive(Debug)]
pub struct FakeConversions {
    scratch: PathBuf,
}

#[async_trait]
impl DerivativeProducer for FakeConversions {
    fn name(&self) -> &'static str {
        "fake-conversions"
    }

    async fn produce(
        &self,
        _source: &SourceId,
        _path: &Path,
    ) -> mediafold_core::Result<Artifact> {
        let file = tempfile::Builder::new()
            .prefix("convert-")
            .suffix(".mp4")
            .tempfile_in(&self.scratch)
            .map_err(PipelineError::Io)?;
        std::fs::write(file.path(), FAKE_MP4).map_err(PipelineError::Io)?;
        Ok(Artifact::TranscodedFile(TranscodedFile::new(
            file.into_temp_path(),
            FAKE_MP4.len() as u64,
        )))
    }
}

/// Streams a file that grows in two steps, `$1` is the input and `$2` the
/// output.
#[derive(Debug)]
pub struct ShellTranscode;

impl TranscodeCommand for ShellTranscode {
    fn program(&self) -> String {
        "sh".to_string()
    }

    fn build(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg("printf 'first-' > \"$2\"; sleep 0.2; printf 'second' >> \"$2\"")
            .arg("sh")
            .arg(input)
            .arg(output);
        cmd
    }
}

pub fn test_config(dir: &Path, strategy: ConversionStrategy) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        media: MediaConfig {
            root: dir.join("media"),
        },
        cache: CacheConfig {
            scratch: dir.join("scratch"),
        },
        ffmpeg: FfmpegConfig {
            ffmpeg_path: "definitely-not-installed-ffmpeg".to_string(),
        },
        thumbnails: ThumbnailConfig {
            workers: 2,
            job_timeout: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(2),
            seek_offset: Duration::from_secs(5),
            fallback_seek_offset: Duration::ZERO,
            width: 320,
        },
        conversion: ConversionConfig {
            strategy,
            workers: 1,
            job_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
        },
        priority: PriorityConfig {
            active: 1,
            background: 10,
        },
        cors: CorsConfig {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            allow_credentials: false,
        },
        dev_mode: false,
        metadata: ConfigMetadata::default(),
    }
}

fn settings(name: &'static str, config: &Config, workers: usize) -> PipelineSettings {
    PipelineSettings {
        name,
        media_root: config.media_root().to_path_buf(),
        workers,
        job_timeout: Duration::from_secs(5),
        tiers: PriorityTiers {
            active: config.priority.active,
            background: config.priority.background,
        },
    }
}

/// Full router over a temporary media root, with fake producers standing in
/// for ffmpeg.
#[allow(unused)]
pub async fn build_test_app(strategy: ConversionStrategy) -> Result<TestApp> {
    let tempdir = tempfile::tempdir()?;
    let config = test_config(tempdir.path(), strategy);
    std::fs::create_dir_all(config.media_root())?;
    config.ensure_directories()?;

    let thumbnails = DerivativePipeline::new(
        settings("thumbnails", &config, config.thumbnails.workers),
        Arc::new(FakeThumbnails),
    );
    let conversion = match strategy {
        ConversionStrategy::Stream => ConversionService::Stream(
            StreamingTranscoder::new(
                Arc::new(ShellTranscode),
                config.scratch_dir(),
                config.conversion.poll_interval,
            ),
        ),
        ConversionStrategy::Queue => ConversionService::Queue(DerivativePipeline::new(
            settings("conversions", &config, config.conversion.workers),
            Arc::new(FakeConversions {
                scratch: config.scratch_dir().to_path_buf(),
            }),
        )),
    };
    let tool = ToolStatus {
        path: config.ffmpeg.ffmpeg_path.clone(),
        available: false,
        version: None,
    };

    let root = config.media_root().to_path_buf();
    let state = AppState::new(Arc::new(config), thumbnails, conversion, tool);
    start_pipelines(&state);

    let server = TestServer::new(create_app(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp {
        server,
        state,
        root,
        _tempdir: tempdir,
    })
}

/// Poll `check` until it returns true or two seconds pass.
#[allow(unused)]
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
