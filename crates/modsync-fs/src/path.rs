//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path normalized to use forward slashes internally.
///
/// Package paths inside the sync root are compared and persisted as strings,
/// so every path goes through this type before it is stored in a marker or
/// shown to the user. Conversion to a platform-native path happens only at
/// I/O boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Forward slashes only, no repeated or trailing separators
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    ///
    /// Backslashes become forward slashes, runs of separators collapse to
    /// one and a trailing separator is dropped (except for the root `/`).
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self {
            inner: collapse_separators(&raw),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment (which may itself contain separators).
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        Self::new(format!("{}/{}", self.inner, segment))
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        match self.inner.rfind('/') {
            Some(0) if self.inner.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) if idx > 0 => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 { None } else { Some(&name[idx + 1..]) }
        })
    }

    /// Iterate over the non-empty segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }

    /// Express this path relative to `base`.
    ///
    /// Returns `None` when `self` is not located under `base`.
    pub fn relative_to(&self, base: &NormalizedPath) -> Option<String> {
        if self.inner == base.inner {
            return Some(String::new());
        }
        let prefix = if base.inner.ends_with('/') {
            base.inner.clone()
        } else {
            format!("{}/", base.inner)
        };
        self.inner.strip_prefix(&prefix).map(str::to_string)
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Resolve symlinks and relative components against the filesystem.
    ///
    /// Uses `dunce` so Windows paths come back without the `\\?\` prefix.
    pub fn canonicalize(&self) -> Result<Self> {
        dunce::canonicalize(self.to_native())
            .map(Self::new)
            .map_err(|e| Error::io(self.to_native(), e))
    }
}

fn collapse_separators(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_slash = false;
    for c in raw.chars() {
        if c == '/' {
            if !last_was_slash {
                out.push(c);
            }
            last_was_slash = true;
        } else {
            out.push(c);
            last_was_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Validate a single directory name that will be created inside a managed
/// tree.
///
/// Rejects empty names, `.`/`..`, separators and NUL so a segment can never
/// escape the directory it is joined onto.
pub fn validate_path_segment(segment: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        Some("segment is empty")
    } else if segment == "." || segment == ".." {
        Some("relative segments are not allowed")
    } else if segment.contains(['/', '\\']) {
        Some("segment contains a path separator")
    } else if segment.contains('\0') {
        Some("segment contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidSegment {
            segment: segment.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}
