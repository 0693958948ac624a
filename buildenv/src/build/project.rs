//! Project working directories.
//!
//! Each (project path, build dir) pair gets a working directory under
//! `<home>/projects/<identity>` holding a merged copy of the project's
//! Gradle build dir plus its `addons`, and a small JSON record describing
//! where it came from.

use std::path::{Path, PathBuf};

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use serde::{Deserialize, Serialize};

use super::access::AccessHandle;
use crate::runtime::constants::project;
use crate::util::fs::{copy_dir_merge, directory_size, remove_path, write_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub project_path: String,
    pub gradle_build_dir: String,
    pub project_tree_uri: String,
    pub project_name: String,
}

impl ProjectInfo {
    pub fn new(project_path: &str, gradle_build_dir: &str, handle: &AccessHandle) -> Self {
        Self {
            project_path: project_path.to_string(),
            gradle_build_dir: gradle_build_dir.to_string(),
            project_tree_uri: handle.path().to_string_lossy().to_string(),
            project_name: handle.name(),
        }
    }

    pub fn write_to(&self, dir: &Path) -> BuildEnvResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(&dir.join(project::INFO_FILENAME), &json)
    }

    /// `None` if absent or unreadable.
    pub fn read_from(dir: &Path) -> Option<Self> {
        let bytes = std::fs::read(dir.join(project::INFO_FILENAME)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Every working directory with a readable record, sorted by name.
    pub fn list_cached(projects_dir: &Path) -> Vec<CachedProject> {
        let Ok(entries) = std::fs::read_dir(projects_dir) else {
            return Vec::new();
        };
        let mut projects: Vec<CachedProject> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter_map(|dir| {
                ProjectInfo::read_from(&dir).map(|info| CachedProject {
                    cache_dir: dir,
                    info,
                })
            })
            .collect();
        projects.sort_by(|a, b| a.info.project_name.cmp(&b.info.project_name));
        projects
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProject {
    pub cache_dir: PathBuf,
    pub info: ProjectInfo,
}

impl CachedProject {
    pub fn size(&self) -> u64 {
        directory_size(&self.cache_dir)
    }
}

/// Merge the project's Gradle build dir (and `addons`, if any) into
/// `work_dir`.
///
/// Exported asset dirs are purged first so removed assets do not linger.
/// The local `addons` copy is replaced wholesale.
pub fn import_project(
    handle: &AccessHandle,
    gradle_build_dir: &str,
    work_dir: &Path,
) -> BuildEnvResult<()> {
    let root = handle.path();
    let build_dir = find_dir(root, gradle_build_dir).ok_or_else(|| {
        BuildEnvError::NotFound(format!("Gradle build dir not found: {}", gradle_build_dir))
    })?;

    if work_dir.exists() {
        for stale in project::STALE_ASSET_DIRS {
            remove_path(&work_dir.join(stale)).map_err(|e| storage_err("purge", work_dir, e))?;
        }
    } else {
        std::fs::create_dir_all(work_dir).map_err(|e| storage_err("create", work_dir, e))?;
    }

    let copied =
        copy_dir_merge(&build_dir, work_dir).map_err(|e| storage_err("import", &build_dir, e))?;
    tracing::debug!(files = copied, from = %build_dir.display(), "Imported Gradle build dir");

    let addons = root.join(project::ADDONS_DIR_NAME);
    if addons.is_dir() {
        let local = work_dir.join(project::ADDONS_DIR_NAME);
        remove_path(&local).map_err(|e| storage_err("replace", &local, e))?;
        let copied = copy_dir_merge(&addons, &local).map_err(|e| storage_err("import", &addons, e))?;
        tracing::debug!(files = copied, "Imported addons");
    }

    Ok(())
}

/// Resolve `relative` under `root` segment by segment, requiring each to
/// be a directory. Empty segments are ignored.
fn find_dir(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        if part == ".." {
            return None;
        }
        current.push(part);
        if !current.is_dir() {
            return None;
        }
    }
    current.is_dir().then_some(current)
}

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> BuildEnvError {
    BuildEnvError::Storage(format!("Failed to {} {}: {}", action, path.display(), e))
}
