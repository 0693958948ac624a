//! Installed rootfs lifecycle.
//!
//! The rootfs counts as installed only once `<rootfs>/.ready` exists. The
//! marker holds the installed version (a release tag, or `custom` for a
//! local archive) and is the last thing written by [`RootfsManager::install`].

use std::fs;
use std::path::{Path, PathBuf};

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};

use super::extract::extract_file;
use super::release::{Progress, ReleaseSource};
use crate::runtime::constants::rootfs;
use crate::runtime::layout::FilesystemLayout;
use crate::util::fs::{remove_path, write_atomic};

#[derive(Debug, Clone)]
pub struct RootfsManager {
    layout: FilesystemLayout,
}

impl RootfsManager {
    pub fn new(layout: FilesystemLayout) -> Self {
        Self { layout }
    }

    pub fn rootfs_dir(&self) -> PathBuf {
        self.layout.rootfs_dir()
    }

    pub fn is_ready(&self) -> bool {
        self.layout.rootfs_ready_file().exists()
    }

    /// Installed version, `None` when not installed.
    pub fn version(&self) -> Option<String> {
        fs::read_to_string(self.layout.rootfs_ready_file())
            .ok()
            .map(|v| v.trim().to_string())
    }

    /// Replace the rootfs, from `archive` when given, otherwise from the
    /// latest published release. Returns the installed version.
    pub fn install(
        &self,
        archive: Option<&Path>,
        source: &dyn ReleaseSource,
        progress: Progress<'_>,
    ) -> BuildEnvResult<String> {
        let rootfs_dir = self.rootfs_dir();
        if rootfs_dir.exists() {
            progress("> Removing existing rootfs...");
            remove_path(&rootfs_dir)?;
        }
        fs::create_dir_all(&rootfs_dir).map_err(|e| {
            BuildEnvError::Storage(format!(
                "Failed to create rootfs dir {}: {}",
                rootfs_dir.display(),
                e
            ))
        })?;

        let version = match archive {
            Some(archive) => {
                progress(&format!("> Extracting rootfs from {}...", archive.display()));
                extract_file(archive, &rootfs_dir)?;
                rootfs::VERSION_CUSTOM.to_string()
            }
            None => self.install_latest(&rootfs_dir, source, progress)?,
        };

        self.apply_resolv_conf_override(&rootfs_dir);
        write_atomic(&self.layout.rootfs_ready_file(), version.as_bytes())?;

        tracing::info!(%version, "Rootfs installed");
        progress("> Rootfs installation complete!");
        Ok(version)
    }

    fn install_latest(
        &self,
        rootfs_dir: &Path,
        source: &dyn ReleaseSource,
        progress: Progress<'_>,
    ) -> BuildEnvResult<String> {
        let temp_dir = self.layout.temp_dir();
        fs::create_dir_all(&temp_dir)?;

        // Removed on drop, whether or not the install succeeds.
        let download = tempfile::Builder::new()
            .prefix("rootfs-")
            .suffix(".tar.xz")
            .tempfile_in(&temp_dir)?;

        let tag = source.download_latest_asset(
            rootfs::GITHUB_REPO,
            rootfs::ARCHIVE_FILENAME,
            download.path(),
            progress,
        )?;

        progress("> Extracting rootfs...");
        extract_file(download.path(), rootfs_dir)?;
        Ok(tag)
    }

    /// Copy `etc/resolv.conf.override` over `etc/resolv.conf`, then delete
    /// the override. Failures leave both files as they are.
    fn apply_resolv_conf_override(&self, rootfs_dir: &Path) {
        let override_file = rootfs_dir.join(rootfs::RESOLV_CONF_OVERRIDE);
        if !override_file.is_file() {
            return;
        }
        let resolv_conf = rootfs_dir.join(rootfs::RESOLV_CONF);

        // Never write through a symlinked resolv.conf.
        let result = remove_path(&resolv_conf)
            .and_then(|_| fs::copy(&override_file, &resolv_conf))
            .and_then(|_| fs::remove_file(&override_file));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to apply resolv.conf override");
        }
    }

    pub fn delete(&self) -> BuildEnvResult<()> {
        let rootfs_dir = self.rootfs_dir();
        remove_path(&rootfs_dir).map_err(|e| {
            BuildEnvError::Storage(format!(
                "Failed to delete rootfs {}: {}",
                rootfs_dir.display(),
                e
            ))
        })?;
        tracing::info!(path = %rootfs_dir.display(), "Rootfs deleted");
        Ok(())
    }

    /// Latest release tag when it differs from the installed version.
    ///
    /// `None` when not installed, installed from a local archive, up to
    /// date, or when the release source cannot be reached.
    pub fn check_for_update(&self, source: &dyn ReleaseSource) -> Option<String> {
        let installed = self.version()?;
        if installed == rootfs::VERSION_CUSTOM {
            return None;
        }
        match source.latest_tag(rootfs::GITHUB_REPO) {
            Ok(latest) if latest != installed => Some(latest),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Unable to check for rootfs updates");
                None
            }
        }
    }
}
