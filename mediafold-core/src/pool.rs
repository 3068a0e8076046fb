use std::{
    any::Any,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::FutureExt;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::{
    error::{PipelineError, Result},
    inflight::Claim,
    queue::Job,
};

#[derive(Debug, Default)]
struct Counters {
    running: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

/// Outcome totals since the pool was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTotals {
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
}

/// Fixed-size execution pool for derivative jobs.
///
/// A slot is a semaphore permit. The dispatcher reserves a slot before it
/// claims a job, and the job task holds both the permit and the claim
/// until it ends, so neither can leak on failure, timeout or panic.
#[derive(Clone)]
pub struct WorkerPool {
    label: &'static str,
    slots: Arc<Semaphore>,
    size: usize,
    job_timeout: Duration,
    counters: Arc<Counters>,
}

impl WorkerPool {
    pub fn new(label: &'static str, size: usize, job_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            label,
            slots: Arc::new(Semaphore::new(size)),
            size,
            job_timeout,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Wait for a free slot. Returns `None` once the pool is closed.
    pub async fn reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).acquire_owned().await.ok()
    }

    /// Stop handing out slots; pending [`reserve`](Self::reserve) calls
    /// return `None`.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs currently running. A slot reserved by the dispatcher while it
    /// waits for work is not counted.
    pub fn active(&self) -> usize {
        self.counters.running.load(Ordering::Relaxed)
    }

    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }

    pub fn totals(&self) -> JobTotals {
        JobTotals {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Run `work` for `job` in its own task under the pool's hard timeout.
    ///
    /// The claim is released before the slot, so the next dispatch never
    /// sees a stale claim for a finished job.
    pub fn spawn<F>(
        &self,
        slot: OwnedSemaphorePermit,
        claim: Claim,
        job: Job,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = self.label;
        let job_timeout = self.job_timeout;
        let counters = Arc::clone(&self.counters);
        let running = Running::start(Arc::clone(&counters));

        tokio::spawn(async move {
            let _slot = slot;
            let _running = running;
            let _claim = claim;
            let Job { source, priority } = job;

            let guarded = tokio::time::timeout(job_timeout, work);
            match AssertUnwindSafe(guarded).catch_unwind().await {
                Ok(Ok(Ok(()))) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    debug!(pool = label, source = %source, priority, "job completed");
                }
                Ok(Ok(Err(PipelineError::SourceNotFound(_)))) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    debug!(pool = label, source = %source, "source vanished, dropping job");
                }
                Ok(Ok(Err(err))) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(pool = label, source = %source, priority, error = %err, "job failed");
                }
                Ok(Err(_)) => {
                    counters.timed_out.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        pool = label,
                        source = %source,
                        priority,
                        timeout = ?job_timeout,
                        "job timed out"
                    );
                }
                Err(payload) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        pool = label,
                        source = %source,
                        panic = panic_message(&*payload),
                        "job panicked"
                    );
                }
            }
        })
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("label", &self.label)
            .field("size", &self.size)
            .field("active", &self.active())
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}

/// Counts a job as running until dropped.
struct Running(Arc<Counters>);

impl Running {
    fn start(counters: Arc<Counters>) -> Self {
        counters.running.fetch_add(1, Ordering::Relaxed);
        Self(counters)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::Relaxed);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
