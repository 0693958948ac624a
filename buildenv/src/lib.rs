//! buildenv: Gradle builds inside a user-space proot sandbox.
//!
//! ```ignore
//! let options = BuildEnvOptions::from_env();
//! let env = BuildEnvironmentBuilder::new().with_options(options).build()?;
//! let scheduler = Scheduler::start(env)?;
//!
//! let handle = scheduler.enqueue(1, Job::RunBuild {
//!     args: vec!["assembleDebug".into()],
//!     project_path: "/sdcard/MyGame".into(),
//!     gradle_build_dir: "android/build".into(),
//! })?;
//! let outcome = handle.wait(|kind, line| println!("[{kind}] {line}"));
//! ```

pub mod build;
pub mod jailer;
pub mod rootfs;
pub mod runtime;
pub mod scheduler;
pub mod util;

pub use build::{
    AccessHandle, AccessRequester, BuildEnvironment, BuildEnvironmentBuilder, HostDirectoryAccess,
};
pub use buildenv_shared::errors::{BuildEnvError, BuildEnvResult, ErrorClass};
pub use buildenv_shared::protocol::{Job, JobEvent, JobId, JobKind, JobOutcome, StreamKind};
pub use jailer::{NoopSandbox, OutputSink, ProotSandbox, Sandbox, SandboxInvocation};
pub use rootfs::{GithubReleases, ReleaseSource, RootfsManager};
pub use runtime::{BuildEnvOptions, FilesystemLayout, Settings};
pub use scheduler::{JobHandle, Scheduler};
pub use util::init_logging;
