//! Artifact descriptor models
//!
//! A requested artifact is identified by the repository it belongs to, its
//! architecture directory, and its file name: `repo/arch/filename`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;

/// Architecture classifier reserved for repository metadata
pub const REPODATA_ARCH: &str = "repodata";

/// Anything that describes a requested repository artifact
///
/// Storage backends keep their own descriptor types; the access filter only
/// needs these three fields.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactDescriptor {
    /// Name of the owning repository
    fn repo(&self) -> &str;

    /// Architecture classifier (`noarch`, `x86_64`, `repodata`, ...)
    fn arch(&self) -> &str;

    /// File name of the artifact
    fn filename(&self) -> &str;

    /// Whether this descriptor points at repository metadata
    fn is_repodata(&self) -> bool {
        self.arch() == REPODATA_ARCH
    }
}

/// Concrete `repo/arch/filename` descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub repo: String,
    pub arch: String,
    pub filename: String,
}

impl FileDescriptor {
    pub fn new(
        repo: impl Into<String>,
        arch: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            arch: arch.into(),
            filename: filename.into(),
        }
    }

    /// Parse a `repo/arch/filename` path
    ///
    /// Leading slashes are ignored. Exactly three non-empty segments are
    /// required.
    pub fn from_path(path: &str) -> Result<Self, ParseError> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            [repo, arch, filename]
                if !repo.is_empty() && !arch.is_empty() && !filename.is_empty() =>
            {
                Ok(Self::new(*repo, *arch, *filename))
            }
            _ => Err(ParseError::InvalidPath(path.to_string())),
        }
    }

    /// `repo/arch/filename`
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.repo, self.arch, self.filename)
    }
}

impl ArtifactDescriptor for FileDescriptor {
    fn repo(&self) -> &str {
        &self.repo
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
