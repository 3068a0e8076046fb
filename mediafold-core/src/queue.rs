use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    fmt,
};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::source::SourceId;

/// Lower values are serviced first.
pub type Priority = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: SourceId,
    pub priority: Priority,
}

impl Job {
    pub fn new(source: SourceId, priority: Priority) -> Self {
        Self { source, priority }
    }
}

/// Heap entry; `sequence` keeps arrival order within a priority.
#[derive(Debug)]
struct QueuedJob {
    job: Job,
    sequence: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority
            && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest element: invert both keys so the
        // lowest priority value, then the earliest sequence, wins.
        other
            .job
            .priority
            .cmp(&self.job.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<QueuedJob>,
    sequence: u64,
    /// Queued copies per source.
    pending: HashMap<SourceId, usize>,
}

impl State {
    fn push(&mut self, job: Job) {
        *self.pending.entry(job.source.clone()).or_default() += 1;
        let sequence = self.sequence;
        self.sequence += 1;
        self.heap.push(QueuedJob { job, sequence });
    }

    fn pop(&mut self) -> Option<Job> {
        let QueuedJob { job, .. } = self.heap.pop()?;
        if let Some(count) = self.pending.get_mut(&job.source) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(&job.source);
            }
        }
        Some(job)
    }
}

/// Unbounded priority queue of derivative jobs.
///
/// Jobs are only ever dropped by [`flush`](Self::flush).
#[derive(Default)]
pub struct PriorityJobQueue {
    state: Mutex<State>,
    available: Notify,
}

impl PriorityJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `job`, even if the same source is already queued.
    pub fn enqueue(&self, job: Job) {
        self.state.lock().push(job);
        self.available.notify_one();
    }

    /// Push `job` unless its source is already queued. Returns whether the
    /// job was added.
    pub fn enqueue_unique(&self, job: Job) -> bool {
        {
            let mut state = self.state.lock();
            if state.pending.contains_key(&job.source) {
                return false;
            }
            state.push(job);
        }
        self.available.notify_one();
        true
    }

    pub fn try_dequeue(&self) -> Option<Job> {
        self.state.lock().pop()
    }

    /// Wait until a job is available and take it.
    ///
    /// Cancel-safe: a job is removed from the queue only when this future
    /// completes.
    pub async fn dequeue(&self) -> Job {
        loop {
            if let Some(job) = self.try_dequeue() {
                return job;
            }
            self.available.notified().await;
        }
    }

    /// Discard every queued job. Returns how many were removed.
    pub fn flush(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.heap.len();
        state.heap.clear();
        state.pending.clear();
        if removed > 0 {
            debug!(removed, "flushed job queue");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, source: &SourceId) -> bool {
        self.state.lock().pending.contains_key(source)
    }
}

impl fmt::Debug for PriorityJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityJobQueue")
            .field("len", &self.len())
            .finish()
    }
}
