//! # mediafold-core
//!
//! The asynchronous derivative pipeline behind the mediafold server.
//!
//! Expensive, blocking transformations (video thumbnail extraction, video
//! conversion) are turned into a cached, concurrency-bounded background
//! service:
//!
//! - [`PriorityJobQueue`] holds pending jobs, lowest priority value first.
//! - [`FolderAffinity`] raises jobs under the folder the user is browsing and
//!   flushes stale work when that folder changes.
//! - [`DerivativePipeline`] owns the queue, the [`DerivativeCache`] and the
//!   in-flight tracker, and runs a single dispatcher loop that feeds a
//!   bounded worker pool.
//! - [`StreamingTranscoder`] is the request-synchronous path: it launches
//!   ffmpeg and tails the growing output file to the client.

pub mod affinity;
pub mod artifact;
pub mod cache;
mod dispatcher;
pub mod error;
pub mod fingerprint;
pub mod inflight;
pub mod media;
pub mod pipeline;
pub mod pool;
pub mod producer;
pub mod queue;
pub mod source;
pub mod stream;
pub mod tools;

pub use affinity::{FolderAffinity, PriorityTiers};
pub use artifact::{Artifact, ThumbnailImage, TranscodedFile};
pub use cache::{ClearCounts, DerivativeCache};
pub use error::{PipelineError, Result};
pub use fingerprint::CacheKey;
pub use inflight::{Claim, InFlightSet};
pub use media::{MediaKind, MediaLibrary};
pub use pipeline::{
    CacheStatus, DerivativePipeline, PipelineSettings, PipelineStats,
};
pub use pool::WorkerPool;
pub use producer::DerivativeProducer;
pub use queue::{Job, Priority, PriorityJobQueue};
pub use source::SourceId;
pub use stream::{StreamingTranscoder, TranscodeCommand, TranscodeSession};
pub use tools::ffmpeg::{
    ConversionProducer, FfmpegTool, ThumbnailProducer, ThumbnailSettings,
    ToolStatus,
};
