//! Runtime configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use serde::{Deserialize, Serialize};

use super::constants::{envs, limits, timeouts};
use super::layout::{self, FilesystemLayout};

/// Options for a build environment instance.
#[derive(Debug, Clone)]
pub struct BuildEnvOptions {
    /// Application storage root.
    pub home_dir: PathBuf,
    /// Where `libproot.so` and its loaders live. Defaults to `<home>/lib`.
    pub lib_dir: Option<PathBuf>,
    /// Shared storage bound into the sandbox at its own path.
    pub external_storage: Option<PathBuf>,
    pub access_timeout: Duration,
    pub max_persisted_grants: usize,
}

impl Default for BuildEnvOptions {
    fn default() -> Self {
        let home_dir = ::dirs::home_dir()
            .map(|h| h.join(layout::dirs::BUILDENV_DIR))
            .unwrap_or_else(|| PathBuf::from(layout::dirs::BUILDENV_DIR));
        Self::with_home(home_dir)
    }
}

impl BuildEnvOptions {
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            lib_dir: None,
            external_storage: None,
            access_timeout: timeouts::DIR_ACCESS_WAIT,
            max_persisted_grants: limits::MAX_PERSISTED_GRANTS,
        }
    }

    /// Defaults overridden by `BUILDENV_HOME`, `BUILDENV_LIB_DIR` and
    /// `BUILDENV_EXTERNAL_STORAGE`. Empty values count as unset.
    pub fn from_env() -> Self {
        let mut options = match non_empty_env(envs::BUILDENV_HOME) {
            Some(home) => Self::with_home(home),
            None => Self::default(),
        };
        options.lib_dir = non_empty_env(envs::BUILDENV_LIB_DIR).map(PathBuf::from);
        options.external_storage =
            non_empty_env(envs::BUILDENV_EXTERNAL_STORAGE).map(PathBuf::from);
        options
    }

    pub fn layout(&self) -> FilesystemLayout {
        FilesystemLayout::new(self.home_dir.clone(), self.lib_dir.clone())
    }

    pub fn validate(&self) -> BuildEnvResult<()> {
        if !self.home_dir.is_absolute() {
            return Err(BuildEnvError::Config(format!(
                "home directory must be absolute: {}",
                self.home_dir.display()
            )));
        }
        if let Some(storage) = &self.external_storage
            && !storage.is_absolute()
        {
            return Err(BuildEnvError::Config(format!(
                "external storage must be absolute: {}",
                storage.display()
            )));
        }
        if self.max_persisted_grants == 0 {
            return Err(BuildEnvError::Config(
                "max_persisted_grants must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// User preferences persisted in `<home>/settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Remove a project's working directory after every build.
    pub clear_cache_after_build: bool,
}

impl Settings {
    /// Missing or unreadable files yield defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed settings");
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> BuildEnvResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        crate::util::fs::write_atomic(path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BuildEnvOptions::with_home("/data/buildenv");
        assert_eq!(options.access_timeout, Duration::from_secs(120));
        assert_eq!(options.max_persisted_grants, 512);
        assert!(options.external_storage.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_home() {
        let options = BuildEnvOptions::with_home("relative/home");
        assert!(matches!(options.validate(), Err(BuildEnvError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_relative_storage() {
        let mut options = BuildEnvOptions::with_home("/data/buildenv");
        options.external_storage = Some(PathBuf::from("sdcard"));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_layout_uses_lib_dir() {
        let mut options = BuildEnvOptions::with_home("/data/buildenv");
        options.lib_dir = Some(PathBuf::from("/opt/proot"));
        assert_eq!(options.layout().lib_dir(), Path::new("/opt/proot"));
    }

    #[test]
    fn test_settings_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            clear_cache_after_build: true,
        };
        settings.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("clearCacheAfterBuild"));
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_settings_malformed_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
