//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! content identifiers of mirrored modules and for detecting local edits to
//! synced packages.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of string content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// Compute a checksum over an entire directory tree.
///
/// Files are visited in sorted relative-path order and both the path and the
/// content feed the hash, so renames, additions, deletions and edits all
/// change the result. Entries named in `exclude` are ignored at any depth.
pub fn compute_tree_checksum(dir: &Path, exclude: &[&str]) -> Result<String> {
    let mut files = Vec::new();
    collect_files(dir, dir, exclude, &mut files)?;
    files.sort_by_key(|p| p.to_string_lossy().replace('\\', "/"));

    let mut hasher = Sha256::new();
    for rel in files {
        let rel_norm = rel.to_string_lossy().replace('\\', "/");
        hasher.update(b"F\0");
        hasher.update(rel_norm.as_bytes());
        hasher.update(b"\0");

        let full = dir.join(&rel);
        let content = fs::read(&full).map_err(|e| Error::io(&full, e))?;
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }

    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

fn collect_files(base: &Path, dir: &Path, exclude: &[&str], out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name();
        if exclude.iter().any(|x| name.to_string_lossy() == *x) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, exclude, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}
