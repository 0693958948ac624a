//! Job protocol between callers and the scheduler.
//!
//! A caller submits a [`Job`] tagged with a non-negative [`JobId`] and reads
//! back a stream of [`JobEvent`]s: zero or more output lines followed by
//! exactly one [`JobEvent::Finished`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Caller-assigned job identity. Only values `>= 0` are accepted.
pub type JobId = i64;

/// Exit code reported when a job could not produce a real one.
pub const EXIT_CODE_UNAVAILABLE: i32 = 255;

/// Origin of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Progress messages produced by buildenv itself.
    Info,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Info => write!(f, "info"),
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    RunBuild,
    CleanProject,
    CleanGlobalCache,
    InstallRootfs,
    DeleteRootfs,
}

/// A unit of work for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    /// Run Gradle for the project's build directory inside the sandbox.
    RunBuild {
        args: Vec<String>,
        project_path: String,
        gradle_build_dir: String,
    },
    /// Remove the project's cached working directory.
    ///
    /// Without `force` this only happens when the
    /// `clear_cache_after_build` setting is on.
    CleanProject {
        project_path: String,
        gradle_build_dir: String,
        force: bool,
    },
    CleanGlobalCache,
    /// Install the sandbox root filesystem, from a local archive when given,
    /// otherwise from the latest published release.
    InstallRootfs { archive: Option<PathBuf> },
    DeleteRootfs,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::RunBuild { .. } => JobKind::RunBuild,
            Job::CleanProject { .. } => JobKind::CleanProject,
            Job::CleanGlobalCache => JobKind::CleanGlobalCache,
            Job::InstallRootfs { .. } => JobKind::InstallRootfs,
            Job::DeleteRootfs => JobKind::DeleteRootfs,
        }
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub exit_code: i32,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            error: None,
        }
    }

    pub fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            error: Some(error.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEvent {
    Output { kind: StreamKind, line: String },
    Finished(JobOutcome),
}
