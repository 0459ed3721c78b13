//! Remote identifier parsing and local package path mapping
//!
//! A remote module is addressed as `namespace/name` plus a revision. Locally
//! it lives at `<sync_root>/<namespace>/<name>`, which must be importable as a
//! package, so both segments have to be valid language identifiers:
//!
//! - `name` may not start with a digit. There is no escaping rule for names,
//!   so such identifiers are rejected at parse time.
//! - `namespace` may start with a digit (account names often do). Those are
//!   escaped with the fixed [`NAMESPACE_ESCAPE_PREFIX`], so `1234/MyModule`
//!   lands in `user_1234/MyModule`.
//!
//! The mapping [`ModuleId`] -> [`LocalPackagePath`] is pure and injective.
//! To keep it injective, namespaces that already look like an escaped
//! namespace (`user_` followed by a digit) are rejected.
//!
//! A revision that is a filesystem path (`/abs/dir`, `./dir`, `../dir`)
//! names a local directory instead of a remote revision; see
//! [`is_local_revision`].

use std::fmt;
use std::path::{Component, Path, PathBuf};

use modsync_fs::NormalizedPath;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix prepended to namespaces that start with a digit.
pub const NAMESPACE_ESCAPE_PREFIX: &str = "user_";

/// Revision used when a declaration does not name one.
pub const DEFAULT_REVISION: &str = "main";

/// Identity of a logical module: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    namespace: String,
    name: String,
}

impl ModuleId {
    /// Parse a `namespace/name` remote identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedIdentifier`] if the input is not exactly two
    /// `/`-separated segments of identifier characters, if the name starts
    /// with a digit, or if the namespace collides with the escape scheme.
    pub fn parse(raw_url: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedIdentifier {
            input: raw_url.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = raw_url.trim().split('/').collect();
        let [namespace, name] = segments.as_slice() else {
            return Err(malformed("expected exactly `namespace/name`"));
        };

        if namespace.is_empty() || name.is_empty() {
            return Err(malformed("namespace and name must not be empty"));
        }
        if !namespace.chars().all(is_identifier_char) {
            return Err(malformed(
                "namespace may only contain ASCII letters, digits and `_`",
            ));
        }
        if !name.chars().all(is_identifier_char) {
            return Err(malformed("name may only contain ASCII letters, digits and `_`"));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(malformed(
                "name starts with a digit, which cannot be imported; rename the remote module",
            ));
        }
        if looks_escaped(namespace) {
            return Err(malformed(
                "namespace collides with the escaped form of a numeric namespace",
            ));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// The remote namespace, unescaped.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where this module lives inside the sync root.
    pub fn local_path(&self) -> LocalPackagePath {
        to_local_path(self)
    }

    /// Pair this identity with a revision.
    pub fn at(&self, revision: &str) -> Result<RemoteReference> {
        validate_revision(revision, &self.to_string())?;
        Ok(RemoteReference {
            id: self.clone(),
            revision: revision.to_string(),
        })
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A module identity pinned to a revision (branch, tag or commit hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteReference {
    id: ModuleId,
    revision: String,
}

impl RemoteReference {
    /// Parse `namespace/name` and validate `revision`.
    pub fn parse(raw_url: &str, revision: &str) -> Result<Self> {
        ModuleId::parse(raw_url)?.at(revision)
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        self.id.namespace()
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// The directory a local revision points at, `None` for remote ones.
    pub fn local_source(&self) -> Option<&Path> {
        is_local_revision(&self.revision).then(|| Path::new(self.revision.as_str()))
    }

    pub fn local_path(&self) -> LocalPackagePath {
        self.id.local_path()
    }
}

impl fmt::Display for RemoteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.revision)
    }
}

/// Relative location of a package inside the sync root.
///
/// Always two segments: the (possibly escaped) namespace directory and the
/// name directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalPackagePath {
    namespace_dir: String,
    name_dir: String,
}

impl LocalPackagePath {
    /// Build from the two on-disk directory names.
    ///
    /// Returns `None` unless the directories decode back to a valid
    /// [`ModuleId`], which filters out foreign directories when scanning the
    /// sync root.
    pub fn from_dirs(namespace_dir: &str, name_dir: &str) -> Option<Self> {
        let candidate = Self {
            namespace_dir: namespace_dir.to_string(),
            name_dir: name_dir.to_string(),
        };
        let id = from_local_path(&candidate).ok()?;
        (to_local_path(&id) == candidate).then_some(candidate)
    }

    pub fn namespace_dir(&self) -> &str {
        &self.namespace_dir
    }

    pub fn name_dir(&self) -> &str {
        &self.name_dir
    }

    /// `namespace_dir/name_dir`
    pub fn as_relative(&self) -> String {
        format!("{}/{}", self.namespace_dir, self.name_dir)
    }

    /// Dotted import path, e.g. `user_1234.MyModule`.
    pub fn import_path(&self) -> String {
        format!("{}.{}", self.namespace_dir, self.name_dir)
    }
}

impl fmt::Display for LocalPackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_relative())
    }
}

/// Map a module identity to its local package path.
pub fn to_local_path(id: &ModuleId) -> LocalPackagePath {
    LocalPackagePath {
        namespace_dir: escape_namespace(id.namespace()),
        name_dir: id.name().to_string(),
    }
}

/// Recover the module identity from a local package path.
///
/// Strips the escape prefix when the remainder starts with a digit. Names
/// are never escaped so they pass through unchanged.
pub fn from_local_path(path: &LocalPackagePath) -> Result<ModuleId> {
    let namespace = unescape_namespace(path.namespace_dir());
    ModuleId::parse(&format!("{}/{}", namespace, path.name_dir()))
}

/// Escape a namespace for use as a directory / package name.
pub fn escape_namespace(namespace: &str) -> String {
    if namespace.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{NAMESPACE_ESCAPE_PREFIX}{namespace}")
    } else {
        namespace.to_string()
    }
}

/// Inverse of [`escape_namespace`].
pub fn unescape_namespace(segment: &str) -> &str {
    match segment.strip_prefix(NAMESPACE_ESCAPE_PREFIX) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => segment,
    }
}

/// Whether `revision` names a local directory rather than a remote revision.
///
/// Absolute paths and paths starting with `./` or `../` are local. Git refs
/// can never take these forms.
pub fn is_local_revision(revision: &str) -> bool {
    matches!(revision, "." | "..")
        || revision.starts_with("./")
        || revision.starts_with("../")
        || revision.starts_with('/')
        || Path::new(revision).is_absolute()
}

/// Anchor a local revision at `base` and fold away `.` and `..` components.
pub fn resolve_local_revision(revision: &str, base: &Path) -> String {
    let mut clean = PathBuf::new();
    for component in base.join(revision).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    NormalizedPath::new(clean).as_str().to_string()
}

fn looks_escaped(namespace: &str) -> bool {
    unescape_namespace(namespace) != namespace
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn validate_revision(revision: &str, module: &str) -> Result<()> {
    let malformed = |reason: &str| Error::MalformedIdentifier {
        input: format!("{module}:{revision}"),
        reason: reason.to_string(),
    };

    if revision.is_empty() {
        return Err(malformed("revision must not be empty"));
    }
    if is_local_revision(revision) {
        if revision.chars().any(char::is_control) {
            return Err(malformed("local revision contains a control character"));
        }
        return Ok(());
    }
    if let Some(bad) = revision
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')))
    {
        return Err(malformed(&format!(
            "revision contains illegal character `{bad}`"
        )));
    }
    if revision.starts_with(['-', '/']) || revision.ends_with('/') || revision.contains("..") {
        return Err(malformed("revision is not a valid branch, tag or commit"));
    }
    Ok(())
}
