use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{artifact::Artifact, fingerprint::CacheKey, inflight::InFlightSet};

/// Counts reported by [`DerivativeCache::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearCounts {
    pub entries: usize,
    pub in_flight: usize,
}

/// Completed derivatives keyed by source fingerprint.
///
/// Entries are never evicted individually. The cache shares the in-flight
/// tracker of its pipeline so an administrative clear wipes both at once.
pub struct DerivativeCache {
    entries: RwLock<HashMap<CacheKey, Arc<Artifact>>>,
    in_flight: Arc<InFlightSet>,
}

impl DerivativeCache {
    pub fn new(in_flight: Arc<InFlightSet>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            in_flight,
        }
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn store(&self, key: CacheKey, artifact: Artifact) -> Arc<Artifact> {
        let artifact = Arc::new(artifact);
        self.entries.write().insert(key, Arc::clone(&artifact));
        artifact
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop every entry and every in-flight claim.
    ///
    /// Jobs still running keep going; their results land after the clear.
    pub fn clear(&self) -> ClearCounts {
        let entries = {
            let mut map = self.entries.write();
            let count = map.len();
            map.clear();
            count
        };
        ClearCounts {
            entries,
            in_flight: self.in_flight.clear(),
        }
    }
}

impl fmt::Debug for DerivativeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeCache")
            .field("entries", &self.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{artifact::ThumbnailImage, source::SourceId};

    #[test]
    fn clear_wipes_entries_and_claims() {
        let in_flight = InFlightSet::new();
        let cache = DerivativeCache::new(Arc::clone(&in_flight));

        let a = SourceId::parse("a.mp4").unwrap();
        let key = CacheKey::derive(&a, None);
        cache.store(
            key.clone(),
            Artifact::ThumbnailImage(ThumbnailImage::jpeg(vec![1, 2, 3])),
        );
        let _claim = in_flight.try_claim(&SourceId::parse("b.mp4").unwrap());

        assert!(cache.lookup(&key).is_some());
        assert_eq!(
            cache.clear(),
            ClearCounts {
                entries: 1,
                in_flight: 1
            }
        );
        assert!(cache.lookup(&key).is_none());
        assert!(in_flight.is_empty());
    }
}
