use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Serialize, Serializer};

use crate::error::{PipelineError, Result};

/// Canonical relative path of a source file (or folder) under the media
/// root.
///
/// This is the single identifier used for queue membership, in-flight
/// claims and cache-key derivation, so every request for the same file maps
/// to the same value regardless of stray slashes in the URL.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    /// Canonicalise a router-decoded relative path.
    ///
    /// Backslashes become `/`, empty and `.` segments are dropped, and any
    /// `..` segment is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.replace('\\', "/");
        let mut segments = Vec::new();

        for segment in normalized.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(PipelineError::InvalidPath {
                        path: raw.to_string(),
                        reason: "parent directory segments are not allowed",
                    });
                }
                s if s.contains('\0') => {
                    return Err(PipelineError::InvalidPath {
                        path: raw.to_string(),
                        reason: "NUL byte in path",
                    });
                }
                s => segments.push(s),
            }
        }

        Ok(Self(segments.join("/")))
    }

    /// The media root itself.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last path segment, or the empty string for the root.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// True when `self` lies inside `folder` (at any depth).
    pub fn is_within(&self, folder: &SourceId) -> bool {
        if folder.is_root() {
            return true;
        }
        self.0
            .strip_prefix(folder.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Lexical join onto `root`; no filesystem access.
    pub fn join_onto(&self, root: &Path) -> PathBuf {
        if self.is_root() {
            root.to_path_buf()
        } else {
            root.join(&self.0)
        }
    }

    pub fn child(&self, name: &str) -> Result<Self> {
        if self.is_root() {
            Self::parse(name)
        } else {
            Self::parse(&format!("{}/{}", self.0, name))
        }
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({:?})", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
