use std::{future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::{
    cache::DerivativeCache, error::Result, fingerprint::CacheKey,
    inflight::InFlightSet, media::MediaLibrary, pool::WorkerPool,
    producer::DerivativeProducer, queue::{Job, PriorityJobQueue},
};

/// The single long-lived loop that drains a pipeline's queue into its
/// worker pool.
pub(crate) struct Dispatcher {
    pub(crate) name: &'static str,
    pub(crate) queue: Arc<PriorityJobQueue>,
    pub(crate) in_flight: Arc<InFlightSet>,
    pub(crate) cache: Arc<DerivativeCache>,
    pub(crate) pool: WorkerPool,
    pub(crate) library: MediaLibrary,
    pub(crate) producer: Arc<dyn DerivativeProducer>,
}

impl Dispatcher {
    pub(crate) async fn run(self, cancel: CancellationToken) {
        info!(
            pipeline = self.name,
            producer = self.producer.name(),
            workers = self.pool.size(),
            timeout = ?self.pool.job_timeout(),
            "dispatcher started"
        );

        loop {
            // Reserve capacity first: a job is never taken off the queue
            // while every slot is busy, so higher-priority arrivals still
            // overtake it.
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                slot = self.pool.reserve() => match slot {
                    Some(slot) => slot,
                    None => break,
                },
            };

            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = self.queue.dequeue() => job,
            };

            let Some(claim) = self.in_flight.try_claim(&job.source) else {
                debug!(
                    pipeline = self.name,
                    source = %job.source,
                    "already in flight, discarding duplicate"
                );
                continue;
            };

            trace!(
                pipeline = self.name,
                source = %job.source,
                priority = job.priority,
                active = self.pool.active(),
                "dispatching job"
            );
            let work = self.process(job.clone());
            self.pool.spawn(slot, claim, job, work);
        }

        info!(pipeline = self.name, "dispatcher stopped");
    }

    fn process(&self, job: Job) -> impl Future<Output = Result<()>> + Send + 'static {
        let library = self.library.clone();
        let cache = Arc::clone(&self.cache);
        let producer = Arc::clone(&self.producer);
        let name = self.name;

        async move {
            let path = library.resolve(&job.source).await?;
            let key = CacheKey::for_file(&job.source, &path).await;
            if cache.contains(&key) {
                debug!(pipeline = name, source = %job.source, "already cached");
                return Ok(());
            }

            let artifact = producer.produce(&job.source, &path).await?;
            debug!(
                pipeline = name,
                source = %job.source,
                kind = artifact.kind(),
                size = artifact.size(),
                "derivative stored"
            );
            cache.store(key, artifact);
            Ok(())
        }
    }
}
