//! Gradle build orchestration inside the sandbox.
//!
//! - [`access`]: directory-access grants and their persistence
//! - [`project`]: per-project working directories and import
//! - [`args`]: Gradle argument rewriting
//! - [`classify`]: exit code and stderr classification
//! - [`aapt2`]: AAPT2 jar recovery
//! - `orchestrator`: [`BuildEnvironment`], tying it together

pub mod aapt2;
pub mod access;
pub mod args;
mod builder;
pub mod classify;
mod orchestrator;
pub mod project;

pub use access::{AccessHandle, AccessRequester, DirectoryAccess, GrantStore, HostDirectoryAccess};
pub use builder::BuildEnvironmentBuilder;
pub use orchestrator::BuildEnvironment;
pub use project::{CachedProject, ProjectInfo, import_project};
