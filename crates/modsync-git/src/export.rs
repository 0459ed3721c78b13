//! Write a commit's tree to a plain directory.

use std::fs;
use std::path::Path;

use git2::{ObjectType, Repository, Tree};

use crate::{Error, Result};

const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_SYMLINK: i32 = 0o120000;

/// Export `tree` into `dest`, skipping entries named in `skip` at any depth.
///
/// Submodules are not followed.
pub fn export_tree(repo: &Repository, tree: &Tree<'_>, dest: &Path, skip: &[&str]) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

    for entry in tree.iter() {
        let Some(name) = entry.name() else {
            tracing::warn!(dest = %dest.display(), "skipping non-UTF-8 tree entry");
            continue;
        };
        if skip.contains(&name) {
            continue;
        }
        let path = dest.join(name);

        match entry.kind() {
            Some(ObjectType::Tree) => {
                let subtree = repo.find_tree(entry.id())?;
                export_tree(repo, &subtree, &path, skip)?;
            }
            Some(ObjectType::Blob) => {
                let blob = repo.find_blob(entry.id())?;
                if entry.filemode() == MODE_SYMLINK {
                    write_symlink(&path, blob.content())?;
                } else {
                    fs::write(&path, blob.content()).map_err(|e| Error::io(&path, e))?;
                    if entry.filemode() == MODE_EXECUTABLE {
                        mark_executable(&path)?;
                    }
                }
            }
            _ => {
                tracing::debug!(path = %path.display(), "skipping submodule");
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn write_symlink(path: &Path, target: &[u8]) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    std::os::unix::fs::symlink(OsStr::from_bytes(target), path).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn write_symlink(path: &Path, target: &[u8]) -> Result<()> {
    fs::write(path, target).map_err(|e| Error::io(path, e))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path).map_err(|e| Error::io(path, e))?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
