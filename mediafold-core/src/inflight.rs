use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::source::SourceId;

/// Sources currently claimed by a worker.
///
/// Each claim carries a generation token. Releasing a claim only removes
/// the entry if the token still matches, so a job that finishes after an
/// administrative [`clear`](Self::clear) cannot evict a newer claim for the
/// same source.
#[derive(Default)]
pub struct InFlightSet {
    claims: Mutex<HashMap<SourceId, u64>>,
    generation: AtomicU64,
}

impl InFlightSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `source` exclusively. Returns `None` when it is already
    /// claimed.
    pub fn try_claim(self: &Arc<Self>, source: &SourceId) -> Option<Claim> {
        let mut claims = self.claims.lock();
        if claims.contains_key(source) {
            return None;
        }
        let token = self.generation.fetch_add(1, Ordering::Relaxed);
        claims.insert(source.clone(), token);
        Some(Claim {
            set: Arc::clone(self),
            source: source.clone(),
            token,
        })
    }

    pub fn contains(&self, source: &SourceId) -> bool {
        self.claims.lock().contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.claims.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every claim. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut claims = self.claims.lock();
        let count = claims.len();
        claims.clear();
        count
    }

    fn release(&self, source: &SourceId, token: u64) {
        let mut claims = self.claims.lock();
        if claims.get(source) == Some(&token) {
            claims.remove(source);
        }
    }
}

impl fmt::Debug for InFlightSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightSet")
            .field("len", &self.len())
            .finish()
    }
}

/// Exclusive claim on a source; released on drop.
pub struct Claim {
    set: Arc<InFlightSet>,
    source: SourceId,
    token: u64,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.set.release(&self.source, self.token);
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("source", &self.source)
            .field("token", &self.token)
            .finish()
    }
}
