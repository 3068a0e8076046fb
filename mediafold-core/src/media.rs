use std::{
    io,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use serde::Serialize;
use tracing::debug;

use crate::{
    error::{PipelineError, Result},
    source::SourceId,
};

const IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];
const VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "avi", "mov", "wmv", "flv", "webm", "mkv"];
/// Containers browsers cannot play natively.
const CONVERT_EXTENSIONS: &[&str] = &["avi", "wmv", "flv", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = extension(path.as_ref())?;
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

pub fn needs_conversion(path: impl AsRef<Path>) -> bool {
    extension(path.as_ref())
        .is_some_and(|ext| CONVERT_EXTENSIONS.contains(&ext.as_str()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderSummary {
    pub name: String,
    pub path: SourceId,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaEntry {
    pub name: String,
    pub path: SourceId,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub modified: Option<f64>,
    pub needs_conversion: bool,
}

/// Read-only view of the media root.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `source` to an absolute path that is guaranteed to stay under
    /// the media root after following symlinks.
    pub async fn resolve(&self, source: &SourceId) -> Result<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root).await.map_err(|err| {
            not_found_or_io(err, self.root.display().to_string())
        })?;

        let candidate = source.join_onto(&root);
        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|err| not_found_or_io(err, source.to_string()))?;

        if !resolved.starts_with(&root) {
            return Err(PipelineError::OutsideRoot(source.to_string()));
        }
        Ok(resolved)
    }

    /// Top-level folders with the number of media files directly inside
    /// each, sorted case-insensitively.
    pub async fn list_folders(&self) -> Result<Vec<FolderSummary>> {
        let root = self.resolve(&SourceId::root()).await?;
        let mut folders = Vec::new();

        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) || !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = match SourceId::parse(&name) {
                Ok(path) => path,
                Err(err) => {
                    debug!(folder = %name, error = %err, "skipping folder");
                    continue;
                }
            };
            let file_count = count_media(&entry.path()).await?;
            folders.push(FolderSummary {
                name,
                path,
                file_count,
            });
        }

        folders.sort_by_key(|f| f.name.to_lowercase());
        Ok(folders)
    }

    /// Media files directly inside `folder`, sorted case-insensitively.
    pub async fn list_media(&self, folder: &SourceId) -> Result<Vec<MediaEntry>> {
        let dir = self.resolve(folder).await?;
        let mut media = Vec::new();

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            let Some(kind) = MediaKind::from_path(&name) else {
                continue;
            };
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64());

            media.push(MediaEntry {
                path: folder.child(&name)?,
                needs_conversion: kind == MediaKind::Video
                    && needs_conversion(&name),
                name,
                kind,
                size: meta.len(),
                modified,
            });
        }

        media.sort_by_key(|m| m.name.to_lowercase());
        Ok(media)
    }
}

async fn count_media(dir: &Path) -> Result<usize> {
    let mut count = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !is_hidden(&name)
            && MediaKind::from_path(&*name).is_some()
            && entry.file_type().await?.is_file()
        {
            count += 1;
        }
    }
    Ok(count)
}

fn not_found_or_io(err: io::Error, what: String) -> PipelineError {
    if err.kind() == io::ErrorKind::NotFound {
        PipelineError::SourceNotFound(what)
    } else {
        PipelineError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(MediaKind::from_path("a/B.JPG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path("clip.webm"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path("notes.txt"), None);
        assert_eq!(MediaKind::from_path("README"), None);

        assert!(needs_conversion("old.AVI"));
        assert!(needs_conversion("show.mkv"));
        assert!(!needs_conversion("clip.mp4"));
    }

    #[tokio::test]
    async fn lists_folders_and_media() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("beta")).unwrap();
        std::fs::create_dir(dir.path().join("Alpha")).unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join("Alpha/b.png"), b"png").unwrap();
        std::fs::write(dir.path().join("Alpha/a.mkv"), b"mkv").unwrap();
        std::fs::write(dir.path().join("Alpha/notes.txt"), b"txt").unwrap();

        let library = MediaLibrary::new(dir.path());

        let folders = library.list_folders().await.unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "beta"]);
        assert_eq!(folders[0].file_count, 2);
        assert_eq!(folders[1].file_count, 0);

        let alpha = SourceId::parse("Alpha").unwrap();
        let media = library.list_media(&alpha).await.unwrap();
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].path.as_str(), "Alpha/a.mkv");
        assert_eq!(media[0].kind, MediaKind::Video);
        assert!(media[0].needs_conversion);
        assert_eq!(media[1].kind, MediaKind::Image);
        assert_eq!(media[1].size, 3);
    }

    #[tokio::test]
    async fn resolve_reports_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path());

        let missing = SourceId::parse("nope/clip.mp4").unwrap();
        assert!(matches!(
            library.resolve(&missing).await,
            Err(PipelineError::SourceNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.jpg"), b"x").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link"))
            .unwrap();

        let library = MediaLibrary::new(dir.path());
        let escaped = SourceId::parse("link/secret.jpg").unwrap();
        assert!(matches!(
            library.resolve(&escaped).await,
            Err(PipelineError::OutsideRoot(_))
        ));
    }
}
