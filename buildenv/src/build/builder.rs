//! BuildEnvironmentBuilder for constructing a [`BuildEnvironment`].

use std::sync::Arc;
use std::time::Duration;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};

use super::access::{AccessRequester, DirectoryAccess, GrantStore, HostDirectoryAccess};
use super::orchestrator::BuildEnvironment;
use crate::jailer::{ProotSandbox, Sandbox, SandboxExecutor};
use crate::rootfs::RootfsManager;
use crate::runtime::options::BuildEnvOptions;

/// Builder for constructing a [`BuildEnvironment`].
///
/// Consuming: each method takes ownership and returns the modified builder.
///
/// # Example
///
/// ```ignore
/// let env = BuildEnvironmentBuilder::new()
///     .with_options(BuildEnvOptions::from_env())
///     .build()?;
/// ```
#[derive(Clone)]
pub struct BuildEnvironmentBuilder {
    options: Option<BuildEnvOptions>,
    requester: Arc<dyn AccessRequester>,
    kill_grace: Option<Duration>,
}

impl Default for BuildEnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildEnvironmentBuilder {
    /// Grants default to [`HostDirectoryAccess`].
    pub fn new() -> Self {
        Self {
            options: None,
            requester: Arc::new(HostDirectoryAccess),
            kill_grace: None,
        }
    }

    /// Set the runtime options (required).
    pub fn with_options(mut self, options: BuildEnvOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Set who is asked when a project has no persisted grant.
    pub fn with_access_requester(mut self, requester: impl AccessRequester + 'static) -> Self {
        self.requester = Arc::new(requester);
        self
    }

    /// Override the SIGTERM to SIGKILL grace period.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = Some(grace);
        self
    }

    /// Build with the proot sandbox rooted at the options' layout.
    ///
    /// # Errors
    ///
    /// [`BuildEnvError::Config`] if options were not set or are invalid.
    pub fn build(self) -> BuildEnvResult<BuildEnvironment<ProotSandbox>> {
        let layout = self
            .options
            .as_ref()
            .ok_or_else(|| BuildEnvError::Config("options are required".to_string()))?
            .layout();
        self.build_with(ProotSandbox::new(layout))
    }

    /// Build with a custom sandbox implementation.
    ///
    /// # Errors
    ///
    /// [`BuildEnvError::Config`] if options were not set or are invalid.
    pub fn build_with<S: Sandbox>(self, sandbox: S) -> BuildEnvResult<BuildEnvironment<S>> {
        let options = self
            .options
            .ok_or_else(|| BuildEnvError::Config("options are required".to_string()))?;
        options.validate()?;

        let layout = options.layout();
        let mut executor = SandboxExecutor::new(sandbox);
        if let Some(grace) = self.kill_grace {
            executor = executor.with_kill_grace(grace);
        }

        tracing::debug!(
            home = %layout.home_dir().display(),
            sandbox = executor.sandbox().name(),
            "Build environment ready"
        );

        Ok(BuildEnvironment {
            executor,
            rootfs: RootfsManager::new(layout.clone()),
            grants: GrantStore::open(layout.grants_file()),
            access: DirectoryAccess::new(),
            requester: self.requester,
            layout,
            options,
        })
    }
}
