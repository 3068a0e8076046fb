use std::{fmt, path::Path};

use bytes::Bytes;
use tempfile::TempPath;

/// A completed derivative.
#[derive(Debug)]
pub enum Artifact {
    ThumbnailImage(ThumbnailImage),
    TranscodedFile(TranscodedFile),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::ThumbnailImage(_) => "thumbnail",
            Artifact::TranscodedFile(_) => "transcode",
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Artifact::ThumbnailImage(image) => image.bytes.len() as u64,
            Artifact::TranscodedFile(file) => file.size,
        }
    }
}

/// Encoded still frame.
#[derive(Clone)]
pub struct ThumbnailImage {
    pub bytes: Bytes,
    pub mime: &'static str,
}

impl ThumbnailImage {
    pub fn jpeg(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: "image/jpeg",
        }
    }
}

impl fmt::Debug for ThumbnailImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A converted video on scratch storage.
///
/// The file is removed when this value is dropped, which happens once the
/// cache entry is cleared and no handler still holds the artifact.
#[derive(Debug)]
pub struct TranscodedFile {
    path: TempPath,
    size: u64,
}

impl TranscodedFile {
    pub fn new(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
