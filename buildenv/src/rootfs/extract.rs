//! Compressed tar extraction with POSIX semantics.
//!
//! Compression is sniffed from magic bytes (xz, gzip, zstd, or none).
//! Every entry is resolved against the canonical destination root and
//! skipped unless it lands strictly inside it, so `../` names and symlinked
//! parents cannot write outside the rootfs.
//!
//! Extraction is not transactional. Callers publish a readiness marker only
//! after [`extract`] returns `Ok`.

use std::fs::{self, File, Permissions};
use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use filetime::FileTime;
use tar::EntryType;

use crate::util::fs::{copy_file_contents, remove_path};

const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Gzip,
    Zstd,
    None,
}

impl Compression {
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(XZ_MAGIC) {
            Compression::Xz
        } else if header.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if header.starts_with(ZSTD_MAGIC) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Entry counts from one extraction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub directories: u64,
    pub files: u64,
    pub symlinks: u64,
    pub hardlinks: u64,
    pub skipped: u64,
}

/// Extract the archive at `archive` into `dest`.
pub fn extract_file(archive: &Path, dest: &Path) -> BuildEnvResult<ExtractStats> {
    let file = File::open(archive).map_err(|e| {
        BuildEnvError::Archive(format!("Failed to open {}: {}", archive.display(), e))
    })?;
    extract(file, dest)
}

/// Extract a possibly-compressed tar stream into `dest`, creating it.
pub fn extract<R: Read>(reader: R, dest: &Path) -> BuildEnvResult<ExtractStats> {
    fs::create_dir_all(dest).map_err(|e| {
        BuildEnvError::Archive(format!(
            "Could not create destination dir {}: {}",
            dest.display(),
            e
        ))
    })?;
    let root = fs::canonicalize(dest)?;

    let mut reader = BufReader::with_capacity(64 * 1024, reader);
    let compression = Compression::detect(reader.fill_buf()?);
    tracing::debug!(?compression, dest = %root.display(), "Extracting archive");

    let stats = match compression {
        Compression::Xz => unpack(xz2::read::XzDecoder::new(reader), &root, hard_link),
        Compression::Gzip => unpack(flate2::read::GzDecoder::new(reader), &root, hard_link),
        Compression::Zstd => unpack(zstd::Decoder::with_buffer(reader)?, &root, hard_link),
        Compression::None => unpack(reader, &root, hard_link),
    }?;

    tracing::info!(
        directories = stats.directories,
        files = stats.files,
        symlinks = stats.symlinks,
        hardlinks = stats.hardlinks,
        skipped = stats.skipped,
        "Archive extracted"
    );
    Ok(stats)
}

/// Directory attributes, applied once all entries are written so that
/// read-only directories can still be populated.
struct DeferredDir {
    path: PathBuf,
    mode: Option<u32>,
    mtime: Option<FileTime>,
}

/// Creates a hard link. On failure the target's contents are copied instead.
type LinkFn = fn(&Path, &Path) -> io::Result<()>;

fn hard_link(target: &Path, link: &Path) -> io::Result<()> {
    fs::hard_link(target, link)
}

fn unpack<R: Read>(reader: R, root: &Path, link: LinkFn) -> BuildEnvResult<ExtractStats> {
    let mut archive = tar::Archive::new(reader);
    let mut stats = ExtractStats::default();
    let mut dirs = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| BuildEnvError::Archive(format!("Failed to read tar entries: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| BuildEnvError::Archive(format!("Failed to read tar entry: {}", e)))?;
        let name = entry.path()?.into_owned();

        let Some(out) = resolve_inside(root, &name) else {
            tracing::warn!(entry = %name.display(), "Skipping archive entry outside destination");
            stats.skipped += 1;
            continue;
        };

        let header = entry.header();
        let mode = header.mode().ok();
        let mtime = header
            .mtime()
            .ok()
            .map(|secs| FileTime::from_unix_time(secs as i64, 0));
        let entry_type = header.entry_type();

        match entry_type {
            EntryType::Directory => {
                if !out.is_dir() {
                    remove_non_dir(&out)?;
                    fs::create_dir_all(&out).map_err(|e| archive_err("create dir", &out, e))?;
                }
                dirs.push(DeferredDir {
                    path: out,
                    mode,
                    mtime,
                });
                stats.directories += 1;
            }
            EntryType::Symlink => {
                let Some(target) = entry.link_name()?.map(|t| t.into_owned()) else {
                    tracing::warn!(entry = %name.display(), "Symlink entry without target");
                    stats.skipped += 1;
                    continue;
                };
                ensure_parent(&out)?;
                remove_non_dir(&out)?;
                std::os::unix::fs::symlink(&target, &out).map_err(|e| {
                    BuildEnvError::Archive(format!(
                        "Failed to create symlink {} -> {}: {}",
                        out.display(),
                        target.display(),
                        e
                    ))
                })?;
                if let Some(mtime) = mtime
                    && let Err(e) = filetime::set_symlink_file_times(&out, mtime, mtime)
                {
                    tracing::debug!(path = %out.display(), error = %e, "Failed to set symlink mtime");
                }
                stats.symlinks += 1;
            }
            EntryType::Link => {
                let Some(link_name) = entry.link_name()?.map(|t| t.into_owned()) else {
                    stats.skipped += 1;
                    continue;
                };
                let Some(target) = resolve_inside(root, &link_name)
                    .map(|t| fs::canonicalize(&t).unwrap_or(t))
                    .filter(|t| t.starts_with(root) && t.as_path() != root)
                else {
                    tracing::warn!(
                        entry = %name.display(),
                        target = %link_name.display(),
                        "Skipping hard link to outside destination"
                    );
                    stats.skipped += 1;
                    continue;
                };
                ensure_parent(&out)?;
                remove_non_dir(&out)?;
                if let Err(e) = link(&target, &out) {
                    tracing::debug!(
                        path = %out.display(),
                        error = %e,
                        "Hard link failed, copying contents"
                    );
                    copy_file_contents(&target, &out)
                        .map_err(|e| archive_err("copy hard link target to", &out, e))?;
                }
                apply_mode(&out, mode);
                apply_mtime(&out, mtime);
                stats.hardlinks += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                ensure_parent(&out)?;
                remove_non_dir(&out)?;
                let mut file = File::create(&out).map_err(|e| archive_err("create", &out, e))?;
                io::copy(&mut entry, &mut file).map_err(|e| archive_err("write", &out, e))?;
                drop(file);
                apply_mode(&out, mode);
                apply_mtime(&out, mtime);
                stats.files += 1;
            }
            other => {
                tracing::debug!(entry = %name.display(), kind = ?other, "Skipping unsupported entry type");
                stats.skipped += 1;
            }
        }
    }

    // Children first, so parent mtimes survive.
    for dir in dirs.iter().rev() {
        apply_mode(&dir.path, dir.mode);
        apply_mtime(&dir.path, dir.mtime);
    }

    Ok(stats)
}

fn archive_err(action: &str, path: &Path, e: io::Error) -> BuildEnvError {
    BuildEnvError::Archive(format!("Failed to {} {}: {}", action, path.display(), e))
}

fn ensure_parent(path: &Path) -> BuildEnvResult<()> {
    if let Some(parent) = path.parent()
        && !parent.is_dir()
    {
        fs::create_dir_all(parent).map_err(|e| archive_err("create dir", parent, e))?;
    }
    Ok(())
}

/// Clear a file or symlink occupying `path`. Directories are kept.
fn remove_non_dir(path: &Path) -> BuildEnvResult<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => remove_path(path).map_err(|e| archive_err("replace", path, e)),
        Err(_) => Ok(()),
    }
}

/// Where `name` lands under `root`, or `None` if that is not strictly
/// inside `root`.
///
/// Existing path prefixes are canonicalized, so symlinked directories are
/// followed; the rest is normalized lexically. The final component is
/// never resolved, so an entry may replace an existing symlink without
/// writing through it.
fn resolve_inside(root: &Path, name: &Path) -> Option<PathBuf> {
    let mut parts: Vec<Component<'_>> = name
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect();
    let last = parts.pop()?;

    let mut current = root.to_path_buf();
    let mut on_disk = true;
    for part in parts {
        match part {
            Component::ParentDir => {
                current.pop();
            }
            Component::Normal(p) => {
                current.push(p);
                if on_disk {
                    match fs::canonicalize(&current) {
                        Ok(real) => current = real,
                        Err(_) => on_disk = false,
                    }
                }
            }
            _ => {}
        }
    }

    match last {
        Component::Normal(p) => current.push(p),
        _ => {
            current.pop();
        }
    }

    (current.starts_with(root) && current != root).then_some(current)
}

fn apply_mode(path: &Path, mode: Option<u32>) {
    let Some(mode) = mode else { return };
    if fs::set_permissions(path, Permissions::from_mode(mode & 0o7777)).is_ok() {
        return;
    }

    // Owner bits only.
    let Ok(meta) = fs::metadata(path) else { return };
    let current = meta.permissions().mode();
    let owner = mode & 0o700;
    let fallback = (current & !0o700) | owner;
    if let Err(e) = fs::set_permissions(path, Permissions::from_mode(fallback)) {
        tracing::debug!(path = %path.display(), error = %e, "Failed to apply mode");
    }
}

fn apply_mtime(path: &Path, mtime: Option<FileTime>) {
    if let Some(mtime) = mtime
        && let Err(e) = filetime::set_file_mtime(path, mtime)
    {
        tracing::debug!(path = %path.display(), error = %e, "Failed to apply mtime");
    }
}
