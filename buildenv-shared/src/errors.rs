//! Error types shared by every buildenv crate.

use thiserror::Error;

/// Result alias used across buildenv.
pub type BuildEnvResult<T> = Result<T, BuildEnvError>;

/// Broad failure categories.
///
/// Determines how a failure is reported: configuration and access errors
/// never reach the sandbox, build errors surface through the build output,
/// infrastructure errors fail the current job only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Access,
    Build,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum BuildEnvError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Rootfs isn't installed. Install it with `buildenv rootfs install`.")]
    RootfsNotInstalled,

    #[error("Directory access not granted in time. Build canceled.")]
    AccessTimeout,

    #[error("access error: {0}")]
    Access(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error("download error: {0}")]
    Download(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BuildEnvError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BuildEnvError::Config(_)
            | BuildEnvError::InvalidArgument(_)
            | BuildEnvError::RootfsNotInstalled => ErrorClass::Configuration,
            BuildEnvError::AccessTimeout | BuildEnvError::Access(_) => ErrorClass::Access,
            BuildEnvError::NotFound(_) => ErrorClass::Build,
            BuildEnvError::Storage(_)
            | BuildEnvError::Archive(_)
            | BuildEnvError::Spawn(_)
            | BuildEnvError::Download(_)
            | BuildEnvError::Internal(_)
            | BuildEnvError::Io(_)
            | BuildEnvError::Json(_) => ErrorClass::Infrastructure,
        }
    }
}
