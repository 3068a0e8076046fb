use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    affinity::{FolderAffinity, PriorityTiers},
    artifact::Artifact,
    cache::{ClearCounts, DerivativeCache},
    dispatcher::Dispatcher,
    error::Result,
    fingerprint::CacheKey,
    inflight::InFlightSet,
    media::MediaLibrary,
    pool::WorkerPool,
    producer::DerivativeProducer,
    queue::PriorityJobQueue,
    source::SourceId,
};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Label used in logs and stats.
    pub name: &'static str,
    pub media_root: PathBuf,
    pub workers: usize,
    pub job_timeout: Duration,
    pub tiers: PriorityTiers,
}

/// What a caller can observe about one source.
#[derive(Debug, Clone)]
pub enum CacheStatus {
    Ready(Arc<Artifact>),
    /// Queued or claimed by a worker.
    Processing,
    NotStarted,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Ready(_) => "ready",
            CacheStatus::Processing => "processing",
            CacheStatus::NotStarted => "not_started",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub cache_size: usize,
    pub queue_size: usize,
    pub processing_count: usize,
    pub workers: usize,
    pub active_workers: usize,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cache_keys: Vec<String>,
}

struct Inner {
    name: &'static str,
    library: MediaLibrary,
    queue: Arc<PriorityJobQueue>,
    affinity: FolderAffinity,
    in_flight: Arc<InFlightSet>,
    cache: Arc<DerivativeCache>,
    pool: WorkerPool,
    producer: Arc<dyn DerivativeProducer>,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// A cached, bounded, priority-aware background service for one kind of
/// derivative.
///
/// Cheap to clone; all clones share the same queue, cache and dispatcher.
#[derive(Clone)]
pub struct DerivativePipeline {
    inner: Arc<Inner>,
}

impl DerivativePipeline {
    pub fn new(
        settings: PipelineSettings,
        producer: Arc<dyn DerivativeProducer>,
    ) -> Self {
        let queue = Arc::new(PriorityJobQueue::new());
        let in_flight = InFlightSet::new();

        Self {
            inner: Arc::new(Inner {
                name: settings.name,
                library: MediaLibrary::new(settings.media_root),
                affinity: FolderAffinity::new(Arc::clone(&queue), settings.tiers),
                queue,
                cache: Arc::new(DerivativeCache::new(Arc::clone(&in_flight))),
                in_flight,
                pool: WorkerPool::new(
                    settings.name,
                    settings.workers,
                    settings.job_timeout,
                ),
                producer,
                cancel: CancellationToken::new(),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Spawn the dispatcher loop. Calling this more than once is a no-op.
    pub fn start(&self) {
        let mut slot = self.inner.dispatcher.lock();
        if slot.is_some() {
            return;
        }
        let dispatcher = Dispatcher {
            name: self.inner.name,
            queue: Arc::clone(&self.inner.queue),
            in_flight: Arc::clone(&self.inner.in_flight),
            cache: Arc::clone(&self.inner.cache),
            pool: self.inner.pool.clone(),
            library: self.inner.library.clone(),
            producer: Arc::clone(&self.inner.producer),
        };
        *slot = Some(tokio::spawn(dispatcher.run(self.inner.cancel.clone())));
    }

    /// Stop the dispatcher. Jobs already running are left to finish or
    /// time out; nothing more is dispatched.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.pool.close();
        let handle = self.inner.dispatcher.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(pipeline = self.inner.name, error = %err, "dispatcher task failed");
        }
    }

    /// Request a derivative for `source`.
    ///
    /// Idempotent: a source that is cached, queued or in flight is not
    /// queued again.
    pub async fn enqueue(&self, source: &SourceId) -> Result<CacheStatus> {
        let path = self.inner.library.resolve(source).await?;
        let key = CacheKey::for_file(source, &path).await;

        if let Some(artifact) = self.inner.cache.lookup(&key) {
            return Ok(CacheStatus::Ready(artifact));
        }
        if self.inner.in_flight.contains(source) {
            return Ok(CacheStatus::Processing);
        }
        match self.inner.affinity.enqueue(source) {
            Some(priority) => {
                debug!(pipeline = self.inner.name, source = %source, priority, "job queued")
            }
            None => {
                debug!(pipeline = self.inner.name, source = %source, "job already queued")
            }
        }
        Ok(CacheStatus::Processing)
    }

    pub async fn status(&self, source: &SourceId) -> Result<CacheStatus> {
        let path = self.inner.library.resolve(source).await?;
        let key = CacheKey::for_file(source, &path).await;

        Ok(match self.inner.cache.lookup(&key) {
            Some(artifact) => CacheStatus::Ready(artifact),
            None if self.inner.in_flight.contains(source)
                || self.inner.queue.contains(source) =>
            {
                CacheStatus::Processing
            }
            None => CacheStatus::NotStarted,
        })
    }

    /// Wipe the cache and every in-flight claim. Queued jobs stay queued.
    pub fn clear(&self) -> ClearCounts {
        let counts = self.inner.cache.clear();
        info!(
            pipeline = self.inner.name,
            entries = counts.entries,
            in_flight = counts.in_flight,
            "cache cleared"
        );
        counts
    }

    pub fn set_active_folder(&self, folder: SourceId) -> bool {
        self.inner.affinity.set_active_folder(folder)
    }

    pub fn active_folder(&self) -> Option<SourceId> {
        self.inner.affinity.active_folder()
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Claimed by a worker right now, as opposed to merely queued.
    pub fn is_processing(&self, source: &SourceId) -> bool {
        self.inner.in_flight.contains(source)
    }

    pub fn processing_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn workers(&self) -> usize {
        self.inner.pool.size()
    }

    pub fn stats(&self) -> PipelineStats {
        let totals = self.inner.pool.totals();
        PipelineStats {
            cache_size: self.inner.cache.len(),
            queue_size: self.inner.queue.len(),
            processing_count: self.inner.in_flight.len(),
            workers: self.inner.pool.size(),
            active_workers: self.inner.pool.active(),
            completed: totals.completed,
            failed: totals.failed,
            timed_out: totals.timed_out,
            cache_keys: self
                .inner
                .cache
                .keys()
                .into_iter()
                .map(|key| key.to_string())
                .collect(),
        }
    }
}

impl fmt::Debug for DerivativePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativePipeline")
            .field("name", &self.inner.name)
            .field("queue", &self.inner.queue)
            .field("cache", &self.inner.cache)
            .field("pool", &self.inner.pool)
            .finish()
    }
}
