//! Gradle build orchestration.
//!
//! [`BuildEnvironment::execute_gradle`] drives one build:
//!
//! 1. refuse to start without an installed rootfs
//! 2. resolve directory access and import the project into its working dir
//! 3. rewrite host paths in the Gradle arguments
//! 4. run Gradle in the sandbox, capturing stderr
//! 5. classify the result
//! 6. on the AAPT2 daemon defect, patch the jars and run Gradle once more

use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use buildenv_shared::protocol::StreamKind;
use parking_lot::Mutex;

use super::aapt2::{find_aapt2_jars, patch_invocation};
use super::access::{AccessHandle, AccessRequester, DirectoryAccess, GrantStore};
use super::args::{gradle_command, rewrite_gradle_args};
use super::classify::{classify, is_aapt2_daemon_failure};
use super::project::{CachedProject, ProjectInfo, import_project};
use crate::jailer::{BindMount, OutputSink, Sandbox, SandboxExecutor, SandboxInvocation};
use crate::rootfs::RootfsManager;
use crate::runtime::constants::{envs, sandbox};
use crate::runtime::layout::FilesystemLayout;
use crate::runtime::options::{BuildEnvOptions, Settings};
use crate::util::fs::remove_path;

/// Forwards every line and keeps a copy of stderr.
struct CapturingSink<'a> {
    inner: &'a dyn OutputSink,
    stderr: Mutex<String>,
}

impl<'a> CapturingSink<'a> {
    fn new(inner: &'a dyn OutputSink) -> Self {
        Self {
            inner,
            stderr: Mutex::new(String::new()),
        }
    }

    fn clear(&self) {
        self.stderr.lock().clear();
    }

    fn stderr(&self) -> String {
        self.stderr.lock().clone()
    }
}

impl OutputSink for CapturingSink<'_> {
    fn emit(&self, kind: StreamKind, line: &str) {
        if kind == StreamKind::Stderr {
            let mut stderr = self.stderr.lock();
            stderr.push_str(line);
            stderr.push('\n');
        }
        self.inner.emit(kind, line);
    }
}

/// Sandboxed Gradle build environment.
///
/// Built with [`BuildEnvironmentBuilder`](super::BuildEnvironmentBuilder).
pub struct BuildEnvironment<S: Sandbox> {
    pub(super) executor: SandboxExecutor<S>,
    pub(super) layout: FilesystemLayout,
    pub(super) options: BuildEnvOptions,
    pub(super) rootfs: RootfsManager,
    pub(super) grants: GrantStore,
    pub(super) access: DirectoryAccess,
    pub(super) requester: Arc<dyn AccessRequester>,
}

impl<S: Sandbox> BuildEnvironment<S> {
    pub fn layout(&self) -> &FilesystemLayout {
        &self.layout
    }

    pub fn options(&self) -> &BuildEnvOptions {
        &self.options
    }

    pub fn rootfs(&self) -> &RootfsManager {
        &self.rootfs
    }

    pub fn settings(&self) -> Settings {
        Settings::load(&self.layout.settings_file())
    }

    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }

    /// Terminate the running sandbox process, if any.
    pub fn kill(&self) {
        self.executor.kill();
    }

    /// Wake a build waiting for access to a project directory.
    pub fn grant_directory_access(&self, handle: AccessHandle) {
        self.access.grant(handle);
    }

    /// Working directories of previously built projects.
    pub fn cached_projects(&self) -> Vec<CachedProject> {
        ProjectInfo::list_cached(&self.layout.projects_dir())
    }

    /// Run Gradle for `gradle_build_dir` of the project at `project_path`.
    ///
    /// Returns the classified exit code. Errors before Gradle starts
    /// (rootfs missing, access, import) are returned as `Err`.
    pub fn execute_gradle(
        &self,
        args: &[String],
        project_path: &str,
        gradle_build_dir: &str,
        sink: &dyn OutputSink,
    ) -> BuildEnvResult<i32> {
        if !self.rootfs.is_ready() {
            return Err(BuildEnvError::RootfsNotInstalled);
        }

        let work_dir = self
            .setup_project(project_path, gradle_build_dir, sink)
            .inspect_err(|e| tracing::error!(project_path, error = %e, "Unable to setup project"))?;

        let args = rewrite_gradle_args(project_path, args);
        let capture = CapturingSink::new(sink);

        let result = self.run_gradle(&args, &work_dir, &capture)?;
        if !is_aapt2_daemon_failure(result, &capture.stderr()) {
            return Ok(result);
        }

        sink.emit(
            StreamKind::Info,
            "> Detected AAPT2 issue - attempting to patch the JAR files...",
        );
        let patched = self.patch_aapt2_jars(&work_dir, sandbox::PROJECT_DIR, sink)
            && self.patch_aapt2_jars(
                &self.layout.gradle_cache_dir(),
                sandbox::GRADLE_CACHE_DIR,
                sink,
            );
        if !patched {
            return Ok(1);
        }

        sink.emit(StreamKind::Info, "> Retrying Gradle build...");
        self.run_gradle(&args, &work_dir, &capture)
    }

    /// Remove the project's working directory and forget its grant.
    ///
    /// Unless `force`, only when `clear_cache_after_build` is set. Returns
    /// whether anything was cleaned.
    pub fn clean_project(
        &self,
        project_path: &str,
        gradle_build_dir: &str,
        force: bool,
    ) -> BuildEnvResult<bool> {
        if !force && !self.settings().clear_cache_after_build {
            return Ok(false);
        }

        let work_dir = self.layout.project_cache_dir(project_path, gradle_build_dir);
        remove_path(&work_dir).map_err(|e| {
            BuildEnvError::Storage(format!("Failed to delete {}: {}", work_dir.display(), e))
        })?;
        self.grants.release(project_path)?;

        tracing::info!(project_path, work_dir = %work_dir.display(), "Project cleaned");
        Ok(true)
    }

    pub fn clean_global_cache(&self) -> BuildEnvResult<()> {
        let cache = self.layout.gradle_cache_dir();
        remove_path(&cache).map_err(|e| {
            BuildEnvError::Storage(format!("Failed to delete {}: {}", cache.display(), e))
        })?;
        tracing::info!(path = %cache.display(), "Global Gradle cache cleaned");
        Ok(())
    }

    fn setup_project(
        &self,
        project_path: &str,
        gradle_build_dir: &str,
        sink: &dyn OutputSink,
    ) -> BuildEnvResult<PathBuf> {
        let handle = match self.grants.get(project_path) {
            Some(handle) => handle,
            None => self.acquire_access(project_path, sink)?,
        };

        let work_dir = self.layout.project_cache_dir(project_path, gradle_build_dir);
        if !work_dir.exists() {
            std::fs::create_dir_all(&work_dir).map_err(|e| {
                BuildEnvError::Storage(format!("Failed to create {}: {}", work_dir.display(), e))
            })?;
            ProjectInfo::new(project_path, gradle_build_dir, &handle).write_to(&work_dir)?;
        }

        sink.emit(StreamKind::Info, "> Importing project files...");
        import_project(&handle, gradle_build_dir, &work_dir)?;
        Ok(work_dir)
    }

    fn acquire_access(
        &self,
        project_path: &str,
        sink: &dyn OutputSink,
    ) -> BuildEnvResult<AccessHandle> {
        sink.emit(
            StreamKind::Stderr,
            &format!(
                "Project path \"{}\" is not accessible. Grant access to the project directory to continue.",
                project_path
            ),
        );

        let handle = self
            .access
            .wait_for_grant(self.options.access_timeout, || {
                self.requester.request_access(project_path, &self.access)
            })
            .ok_or(BuildEnvError::AccessTimeout)?;
        sink.emit(
            StreamKind::Info,
            &format!("Access granted for {}. Starting Gradle build...", project_path),
        );

        let persisted = self.grants.persist(project_path, handle.clone())?;
        let limit = self.options.max_persisted_grants;
        if persisted > limit {
            self.grants.release(project_path)?;
            return Err(BuildEnvError::Access(format!(
                "Persisted directory access limit reached ({})",
                limit
            )));
        }
        if persisted == limit {
            sink.emit(
                StreamKind::Info,
                "Warning: Persisted directory access limit reached. This build will continue, \
                 but new projects will require cleaning older ones.",
            );
        }
        Ok(handle)
    }

    fn run_gradle(
        &self,
        args: &[String],
        work_dir: &Path,
        capture: &CapturingSink<'_>,
    ) -> BuildEnvResult<i32> {
        let cache = self.layout.gradle_cache_dir();
        std::fs::create_dir_all(&cache).map_err(|e| {
            BuildEnvError::Storage(format!("Failed to create {}: {}", cache.display(), e))
        })?;

        let mut invocation = SandboxInvocation::new(sandbox::SHELL)
            .arg("-c")
            .arg(gradle_command(args));
        if let Some(storage) = &self.options.external_storage {
            invocation = invocation.bind_mount(BindMount::identity(storage));
        }
        let invocation = invocation
            .bind(work_dir, sandbox::PROJECT_DIR)
            .bind(&cache, sandbox::GRADLE_CACHE_DIR)
            .work_dir(sandbox::PROJECT_DIR)
            .env(envs::GRADLE_OPTS, sandbox::GRADLE_OPTS);

        capture.clear();
        let exit_code = self.executor.execute(&invocation, capture)?;
        let result = classify(exit_code, &capture.stderr());
        tracing::info!(exit_code, result, "Gradle finished");
        Ok(result)
    }

    /// Returns false as soon as one jar fails to patch.
    fn patch_aapt2_jars(&self, host_dir: &Path, bound_path: &str, sink: &dyn OutputSink) -> bool {
        let jars = find_aapt2_jars(host_dir);
        if jars.is_empty() {
            return true;
        }

        sink.emit(
            StreamKind::Info,
            &format!("> Patching {} AAPT2 JAR(s) in {}...", jars.len(), bound_path),
        );

        for jar in &jars {
            tracing::debug!(jar = %jar.display(), "Patching AAPT2 jar");
            let invocation = patch_invocation(host_dir, bound_path, jar);
            let ok = match self.executor.execute(&invocation, sink) {
                Ok(code) => code == 0,
                Err(e) => {
                    tracing::warn!(jar = %jar.display(), error = %e, "AAPT2 patch did not run");
                    false
                }
            };
            if !ok {
                let name = jar
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                sink.emit(StreamKind::Stderr, &format!("Failed to patch {}", name));
                return false;
            }
        }
        true
    }
}
