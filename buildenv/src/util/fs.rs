//! Filesystem helpers shared by project import, the archive installer and
//! persisted state.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use walkdir::WalkDir;

/// Copy file contents into a fresh inode at `dest`.
///
/// Tries a reflink (CoW clone) first and falls back to a byte copy on
/// filesystems without clone support.
pub fn copy_file_contents(src: &Path, dest: &Path) -> io::Result<()> {
    match reflink_copy::reflink(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dest)?;
            Ok(())
        }
    }
}

/// Merge `src` into `dest`.
///
/// Creates missing directories, overwrites existing files and recreates
/// symlinks. Nothing already in `dest` is removed. Returns the number of
/// files written.
pub fn copy_dir_merge(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut copied = 0u64;
    fs::create_dir_all(dest)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if target.symlink_metadata().is_ok_and(|m| !m.is_dir()) {
                fs::remove_file(&target)?;
            }
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            remove_path(&target)?;
            std::os::unix::fs::symlink(&link, &target)?;
            copied += 1;
        } else {
            if target.symlink_metadata().is_ok_and(|m| m.is_dir()) {
                fs::remove_dir_all(&target)?;
            } else if target.symlink_metadata().is_ok() {
                fs::remove_file(&target)?;
            }
            copy_file_contents(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Remove a file, symlink or directory tree. Missing paths are fine.
pub fn remove_path(path: &Path) -> io::Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `path` with `bytes` via a synced temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> BuildEnvResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| BuildEnvError::Storage(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| {
        BuildEnvError::Storage(format!("Failed to persist {}: {}", path.display(), e))
    })?;
    Ok(())
}

/// Total size of regular files under `path`. Symlinks are not followed or
/// counted. A missing directory has size zero.
pub fn directory_size(path: &Path) -> u64 {
    if !path.is_dir() {
        return 0;
    }
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Human-readable size, e.g. `512 B`, `1.5 KB`, `234.6 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut unit = 0;
    let mut divisor = 1024f64;
    while unit + 1 < UNITS.len() && bytes as f64 >= divisor * 1024.0 {
        divisor *= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", bytes as f64 / divisor, UNITS[unit])
}
