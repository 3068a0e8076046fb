use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::{
    queue::{Job, Priority, PriorityJobQueue},
    source::SourceId,
};

/// The two scheduling tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityTiers {
    pub active: Priority,
    pub background: Priority,
}

impl Default for PriorityTiers {
    fn default() -> Self {
        Self {
            active: 1,
            background: 10,
        }
    }
}

/// Tracks the folder the user is browsing and prioritises its jobs.
///
/// The active-folder lock is held for reading across classify-and-push and
/// for writing across flush-and-set, so no job classified under the old
/// folder can land in the queue after a switch has flushed it.
#[derive(Debug)]
pub struct FolderAffinity {
    active: RwLock<Option<SourceId>>,
    queue: Arc<PriorityJobQueue>,
    tiers: PriorityTiers,
}

impl FolderAffinity {
    pub fn new(queue: Arc<PriorityJobQueue>, tiers: PriorityTiers) -> Self {
        Self {
            active: RwLock::new(None),
            queue,
            tiers,
        }
    }

    /// Switch the active folder. When it changes, every queued job is
    /// discarded before the new folder becomes visible to [`classify`].
    /// Returns whether the folder changed.
    ///
    /// [`classify`]: Self::classify
    pub fn set_active_folder(&self, folder: SourceId) -> bool {
        let mut active = self.active.write();
        if active.as_ref() == Some(&folder) {
            return false;
        }
        let flushed = self.queue.flush();
        info!(folder = %folder, flushed, "active folder changed");
        *active = Some(folder);
        true
    }

    pub fn active_folder(&self) -> Option<SourceId> {
        self.active.read().clone()
    }

    pub fn classify(&self, source: &SourceId) -> Priority {
        Self::tier_for(self.active.read().as_ref(), source, self.tiers)
    }

    /// Classify `source` and queue it unless already queued. Returns the
    /// priority when a job was added.
    pub fn enqueue(&self, source: &SourceId) -> Option<Priority> {
        let active = self.active.read();
        let priority = Self::tier_for(active.as_ref(), source, self.tiers);
        self.queue
            .enqueue_unique(Job::new(source.clone(), priority))
            .then_some(priority)
    }

    pub fn tiers(&self) -> PriorityTiers {
        self.tiers
    }

    fn tier_for(
        active: Option<&SourceId>,
        source: &SourceId,
        tiers: PriorityTiers,
    ) -> Priority {
        match active {
            Some(folder) if source.is_within(folder) => tiers.active,
            _ => tiers.background,
        }
    }
}
