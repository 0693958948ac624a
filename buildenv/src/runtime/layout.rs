//! On-disk layout of a buildenv home directory.
//!
//! ```text
//! ~/.buildenv/
//! ├── rootfs/alpine-android-35-jdk17/   sandbox root filesystem (+ .ready)
//! ├── projects/<hash>/                  per-project working directories
//! ├── global-gradle-cache/              shared Gradle cache
//! ├── proot-tmp/                        wrapper scratch space
//! ├── tmp/                              staged downloads
//! ├── logs/
//! ├── lib/                              proot + loaders (default lib dir)
//! ├── grants.json
//! └── settings.json
//! ```

use std::path::{Path, PathBuf};

use super::constants::{binaries, rootfs};

pub mod dirs {
    pub const BUILDENV_DIR: &str = ".buildenv";
    pub const ROOTFS_DIR: &str = "rootfs/alpine-android-35-jdk17";
    pub const PROJECTS_DIR: &str = "projects";
    pub const GRADLE_CACHE_DIR: &str = "global-gradle-cache";
    pub const PROOT_TMP_DIR: &str = "proot-tmp";
    pub const TEMP_DIR: &str = "tmp";
    pub const LOGS_DIR: &str = "logs";
    pub const LIB_DIR: &str = "lib";
}

pub mod files {
    pub const GRANTS: &str = "grants.json";
    pub const SETTINGS: &str = "settings.json";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
    lib_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf, lib_dir: Option<PathBuf>) -> Self {
        let lib_dir = lib_dir.unwrap_or_else(|| home_dir.join(dirs::LIB_DIR));
        Self { home_dir, lib_dir }
    }

    /// Application storage root. Also the cwd of every spawned wrapper.
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    pub fn rootfs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::ROOTFS_DIR)
    }

    pub fn rootfs_ready_file(&self) -> PathBuf {
        self.rootfs_dir().join(rootfs::READY_FILE)
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::PROJECTS_DIR)
    }

    pub fn gradle_cache_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::GRADLE_CACHE_DIR)
    }

    pub fn proot_tmp_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::PROOT_TMP_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::TEMP_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    pub fn grants_file(&self) -> PathBuf {
        self.home_dir.join(files::GRANTS)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.home_dir.join(files::SETTINGS)
    }

    pub fn proot_binary(&self) -> PathBuf {
        self.lib_dir.join(binaries::PROOT)
    }

    pub fn proot_loader(&self) -> PathBuf {
        self.lib_dir.join(binaries::PROOT_LOADER)
    }

    pub fn proot_loader_32(&self) -> PathBuf {
        self.lib_dir.join(binaries::PROOT_LOADER_32)
    }

    /// Working directory for a project build directory.
    ///
    /// Named by [`project_identity`]; two projects that collide share a
    /// directory.
    pub fn project_cache_dir(&self, project_path: &str, gradle_build_dir: &str) -> PathBuf {
        self.projects_dir()
            .join(project_identity(project_path, gradle_build_dir))
    }
}

/// Stable identity of a (project path, build dir) pair.
///
/// Lower-case hex of the 32-bit Java `String.hashCode` of the joined,
/// normalized path. Existing working directories are found by this name,
/// so the scheme must not change.
pub fn project_identity(project_path: &str, gradle_build_dir: &str) -> String {
    let full = join_normalized(project_path, gradle_build_dir);
    format!("{:x}", java_string_hash(&full) as u32)
}

/// Join two path strings the way `java.io.File(parent, child)` does:
/// one separator between them, duplicate and trailing separators dropped.
fn join_normalized(parent: &str, child: &str) -> String {
    let joined = if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}/{}", parent, child)
    };

    let mut out = String::with_capacity(joined.len());
    let mut prev_slash = false;
    for c in joined.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16 code units, wrapping.
pub(crate) fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}
