//! Request-synchronous conversion: launch the tool against a private
//! scratch file and tail that file to the client while it grows.

use std::{
    collections::VecDeque,
    fmt, io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::{Duration, Instant},
};

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use tempfile::TempPath;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::{Child, ChildStderr, Command},
};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 20;

/// Builds the subprocess that writes a streamable container for `input`
/// into `output`.
pub trait TranscodeCommand: Send + Sync + 'static {
    /// Program name for error messages.
    fn program(&self) -> String;

    fn build(&self, input: &Path, output: &Path) -> Command;
}

#[derive(Clone)]
pub struct StreamingTranscoder {
    command: Arc<dyn TranscodeCommand>,
    scratch: PathBuf,
    poll_interval: Duration,
    chunk_size: usize,
}

impl StreamingTranscoder {
    pub fn new(
        command: Arc<dyn TranscodeCommand>,
        scratch: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            command,
            scratch: scratch.into(),
            poll_interval,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Launch a transformation of `input`.
    ///
    /// Startup failures (unreadable input, missing tool) are returned here
    /// so the caller can answer with a proper error before any body bytes
    /// are sent.
    pub async fn start(&self, input: &Path) -> Result<TranscodeSession> {
        match tokio::fs::metadata(input).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(PipelineError::Unsupported(format!(
                    "{} is not a regular file",
                    input.display()
                )));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::SourceNotFound(
                    input.display().to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        }

        tokio::fs::create_dir_all(&self.scratch).await?;
        let output = tempfile::Builder::new()
            .prefix("stream-")
            .suffix(".mp4")
            .tempfile_in(&self.scratch)?
            .into_temp_path();
        let reader = File::open(&output).await?;

        let mut command = self.command.build(input, &output);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                PipelineError::ToolUnavailable(self.command.program())
            } else {
                PipelineError::Io(err)
            }
        })?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(collect_stderr(stderr, Arc::clone(&stderr_tail)));
        }

        info!(
            pid = child.id(),
            input = %input.display(),
            output = %output.display(),
            "streaming transcode started"
        );

        Ok(TranscodeSession {
            child,
            output: Some(output),
            reader,
            input: input.to_path_buf(),
            poll_interval: self.poll_interval,
            chunk_size: self.chunk_size,
            stderr_tail,
            started: Instant::now(),
            sent: 0,
            finished: false,
        })
    }
}

impl fmt::Debug for StreamingTranscoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingTranscoder")
            .field("program", &self.command.program())
            .field("scratch", &self.scratch)
            .field("poll_interval", &self.poll_interval)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// One running transformation and its tail position.
///
/// Dropping the session (for instance when the client disconnects and the
/// response body is dropped) kills the subprocess and deletes the scratch
/// file.
pub struct TranscodeSession {
    child: Child,
    output: Option<TempPath>,
    reader: File,
    input: PathBuf,
    poll_interval: Duration,
    chunk_size: usize,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    started: Instant,
    sent: u64,
    finished: bool,
}

impl TranscodeSession {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Tail the output file until the process exits.
    ///
    /// Each item is whatever was appended since the previous read. When
    /// nothing new is available the stream sleeps for the poll interval and
    /// checks whether the process has exited; on exit it drains what is
    /// left and ends.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let mut session = self;
        try_stream! {
            let mut buf = vec![0u8; session.chunk_size];
            loop {
                let n = session.reader.read(&mut buf).await?;
                if n > 0 {
                    session.sent += n as u64;
                    yield Bytes::copy_from_slice(&buf[..n]);
                    continue;
                }

                let Some(status) = session.child.try_wait()? else {
                    tokio::time::sleep(session.poll_interval).await;
                    continue;
                };

                loop {
                    let n = session.reader.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    session.sent += n as u64;
                    yield Bytes::copy_from_slice(&buf[..n]);
                }

                session.finish(status)?;
                break;
            }
        }
    }

    fn finish(&mut self, status: ExitStatus) -> io::Result<()> {
        self.finished = true;
        // Already reaped; a failure here only means there was nothing left
        // to kill.
        let _ = self.child.start_kill();

        if let Some(output) = self.output.take()
            && let Err(err) = output.close()
        {
            warn!(error = %err, "failed to remove transcode scratch file");
        }

        let elapsed = self.started.elapsed();
        if status.success() {
            info!(
                input = %self.input.display(),
                bytes = self.sent,
                elapsed = ?elapsed,
                "streaming transcode finished"
            );
            return Ok(());
        }

        let stderr = self.stderr_tail();
        warn!(
            input = %self.input.display(),
            %status,
            bytes = self.sent,
            stderr = %stderr,
            "streaming transcode exited with failure"
        );
        if self.sent == 0 {
            return Err(io::Error::other(format!(
                "transcoder exited with {status}: {stderr}"
            )));
        }
        Ok(())
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Drop for TranscodeSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(
            pid = self.child.id(),
            input = %self.input.display(),
            bytes = self.sent,
            "transcode stream dropped before completion, killing process"
        );
        let _ = self.child.start_kill();
    }
}

impl fmt::Debug for TranscodeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodeSession")
            .field("pid", &self.child.id())
            .field("input", &self.input)
            .field("output", &self.output)
            .field("sent", &self.sent)
            .finish()
    }
}

async fn collect_stderr(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut tail = tail.lock();
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Runs `script` with the input and output paths as `$1` and `$2`.
    struct ShellScript(&'static str);

    impl TranscodeCommand for ShellScript {
        fn program(&self) -> String {
            "sh".to_string()
        }

        fn build(&self, input: &Path, output: &Path) -> Command {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.0).arg("sh").arg(input).arg(output);
            cmd
        }
    }

    struct Missing;

    impl TranscodeCommand for Missing {
        fn program(&self) -> String {
            "definitely-not-installed-transcoder".to_string()
        }

        fn build(&self, _input: &Path, _output: &Path) -> Command {
            Command::new("definitely-not-installed-transcoder")
        }
    }

    fn transcoder(
        command: impl TranscodeCommand,
        scratch: &Path,
    ) -> StreamingTranscoder {
        StreamingTranscoder::new(
            Arc::new(command),
            scratch,
            Duration::from_millis(20),
        )
    }

    fn input(dir: &Path) -> PathBuf {
        let path = dir.join("clip.avi");
        std::fs::write(&path, b"source").unwrap();
        path
    }

    #[tokio::test]
    async fn first_chunk_arrives_before_process_exits() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let transcoder = transcoder(
            ShellScript("printf first > \"$2\"; sleep 2; printf second >> \"$2\""),
            &scratch,
        );

        let started = Instant::now();
        let session = transcoder.start(&input(dir.path())).await.unwrap();
        let output = session.output_path().unwrap().to_path_buf();
        let mut stream = Box::pin(session.into_stream());

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("first chunk within 1s")
            .unwrap()
            .unwrap();
        assert_eq!(&first[..], b"first");
        assert!(started.elapsed() < Duration::from_secs(2));

        let mut rest = Vec::new();
        while let Some(chunk) = stream.next().await {
            rest.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(rest, b"second");
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn dropping_stream_kills_process_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let transcoder = transcoder(
            ShellScript("printf x > \"$2\"; sleep 1; touch \"$2.done\""),
            &scratch,
        );

        let session = transcoder.start(&input(dir.path())).await.unwrap();
        let output = session.output_path().unwrap().to_path_buf();
        let mut marker = output.clone().into_os_string();
        marker.push(".done");
        let marker = PathBuf::from(marker);

        let mut stream = Box::pin(session.into_stream());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"x");
        drop(stream);

        assert!(!output.exists());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "process outlived the stream");
    }

    #[tokio::test]
    async fn failing_tool_without_output_errors_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder =
            transcoder(ShellScript("echo 'bad codec' >&2; exit 3"), dir.path());

        let session = transcoder.start(&input(dir.path())).await.unwrap();
        let items: Vec<_> = session.into_stream().collect().await;
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert!(err.to_string().contains("exit"));
    }

    #[tokio::test]
    async fn startup_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();

        let missing_tool = transcoder(Missing, dir.path());
        assert!(matches!(
            missing_tool.start(&input(dir.path())).await,
            Err(PipelineError::ToolUnavailable(_))
        ));

        let ok_tool = transcoder(ShellScript("true"), dir.path());
        assert!(matches!(
            ok_tool.start(&dir.path().join("absent.avi")).await,
            Err(PipelineError::SourceNotFound(_))
        ));
    }
}
