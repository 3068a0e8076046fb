use std::{
    fmt,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use sha2::{Digest, Sha256};

use crate::source::SourceId;

/// Content fingerprint of a source file: its logical path plus its
/// modification time.
///
/// A file touched after a derivative was produced gets a new key, so stale
/// entries simply stop being looked up. Files that cannot be stat'd fall
/// back to a fingerprint of the path alone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(source: &SourceId, modified: Option<SystemTime>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_str().as_bytes());

        if let Some(modified) = modified {
            // Pre-epoch timestamps are rare but valid; keep them distinct.
            let (sign, nanos) = match modified.duration_since(UNIX_EPOCH) {
                Ok(d) => (b'+', d.as_nanos()),
                Err(e) => (b'-', e.duration().as_nanos()),
            };
            hasher.update([0u8, sign]);
            hasher.update(nanos.to_be_bytes());
        }

        Self(format!("{:x}", hasher.finalize()))
    }

    /// Stat `path` and derive the key for `source`.
    pub async fn for_file(source: &SourceId, path: &Path) -> Self {
        let modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|meta| meta.modified().ok());
        Self::derive(source, modified)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.0[..12.min(self.0.len())])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source() -> SourceId {
        SourceId::parse("trip/clip.mp4").unwrap()
    }

    #[test]
    fn same_inputs_same_key() {
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = CacheKey::derive(&source(), Some(mtime));
        let b = CacheKey::derive(&source(), Some(mtime));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn modification_changes_key() {
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = CacheKey::derive(&source(), Some(mtime));
        let b = CacheKey::derive(
            &source(),
            Some(mtime + Duration::from_nanos(1)),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn unstatable_file_degrades_to_path_only() {
        let path_only = CacheKey::derive(&source(), None);
        assert_ne!(path_only, CacheKey::derive(&source(), Some(UNIX_EPOCH)));
        assert_ne!(
            path_only,
            CacheKey::derive(&SourceId::parse("trip/other.mp4").unwrap(), None)
        );
    }

    #[tokio::test]
    async fn key_follows_file_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"v1").unwrap();

        let first = CacheKey::for_file(&source(), &path).await;
        assert_eq!(first, CacheKey::for_file(&source(), &path).await);

        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        drop(file);

        assert_ne!(first, CacheKey::for_file(&source(), &path).await);

        let missing = dir.path().join("gone.mp4");
        assert_eq!(
            CacheKey::for_file(&source(), &missing).await,
            CacheKey::derive(&source(), None)
        );
    }
}
