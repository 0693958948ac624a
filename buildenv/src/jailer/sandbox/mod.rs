//! Sandbox abstraction for process wrapping.
//!
//! A [`Sandbox`] turns a [`SandboxInvocation`] into a ready-to-spawn
//! [`Command`]. The executor never knows how the command is confined.
//!
//! | Sandbox | Mechanism |
//! |---------|-----------|
//! | [`ProotSandbox`] | proot user-space chroot into the rootfs |
//! | [`NoopSandbox`] | passthrough on the host (tests, development) |

mod proot;

pub use proot::ProotSandbox;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use buildenv_shared::errors::BuildEnvResult;

/// Process wrapping at spawn time.
pub trait Sandbox: Send + Sync {
    /// Pre-spawn setup, called before every launch.
    fn setup(&self) -> BuildEnvResult<()>;

    /// Wrap the invocation. Stdio is configured by the caller.
    fn wrap(&self, invocation: &SandboxInvocation) -> Command;

    /// Name for logging.
    fn name(&self) -> &'static str;
}

/// A host directory made visible inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host: PathBuf,
    pub sandbox: PathBuf,
}

impl BindMount {
    pub fn new(host: impl Into<PathBuf>, sandbox: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            sandbox: sandbox.into(),
        }
    }

    /// Same path on both sides.
    pub fn identity(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            host: path.clone(),
            sandbox: path,
        }
    }
}

/// One command to run inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInvocation {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Applied in order.
    pub binds: Vec<BindMount>,
    /// Working directory as seen from inside the sandbox.
    pub work_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl SandboxInvocation {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            binds: Vec::new(),
            work_dir: PathBuf::from("/"),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn bind(mut self, host: impl Into<PathBuf>, sandbox: impl Into<PathBuf>) -> Self {
        self.binds.push(BindMount::new(host, sandbox));
        self
    }

    pub fn bind_mount(mut self, bind: BindMount) -> Self {
        self.binds.push(bind);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Argument vector as it would run, for logging.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.executable.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Passthrough sandbox that applies no confinement.
///
/// Runs the executable directly on the host. Bind mounts are ignored; the
/// work dir is used as the host cwd when it exists.
#[derive(Debug)]
pub struct NoopSandbox;

impl NoopSandbox {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox for NoopSandbox {
    fn setup(&self) -> BuildEnvResult<()> {
        Ok(())
    }

    fn wrap(&self, invocation: &SandboxInvocation) -> Command {
        let mut cmd = Command::new(&invocation.executable);
        cmd.args(&invocation.args);
        cmd.envs(&invocation.env);
        if Path::new(&invocation.work_dir).is_dir() {
            cmd.current_dir(&invocation.work_dir);
        }
        cmd
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
