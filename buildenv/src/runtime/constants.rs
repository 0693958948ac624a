//! Constants for the buildenv runtime.
//!
//! Host-side names and tunables. The sandbox-facing contract lives in
//! `buildenv_shared::constants`.

pub use buildenv_shared::constants::{project, rootfs, sandbox};

pub mod envs {
    pub const BUILDENV_HOME: &str = "BUILDENV_HOME";

    /// Directory holding the proot binary and its loaders.
    pub const BUILDENV_LIB_DIR: &str = "BUILDENV_LIB_DIR";

    /// Shared storage bound into the sandbox at the same path.
    pub const BUILDENV_EXTERNAL_STORAGE: &str = "BUILDENV_EXTERNAL_STORAGE";

    /// Set on the wrapper process, read by proot itself.
    pub const PROOT_TMP_DIR: &str = "PROOT_TMP_DIR";
    pub const PROOT_LOADER: &str = "PROOT_LOADER";
    pub const PROOT_LOADER_32: &str = "PROOT_LOADER_32";

    /// Passed into every sandboxed command.
    pub const GRADLE_OPTS: &str = "GRADLE_OPTS";
}

/// Wrapper binaries shipped in the lib directory.
pub mod binaries {
    pub const PROOT: &str = "libproot.so";
    pub const PROOT_LOADER: &str = "libproot-loader.so";
    pub const PROOT_LOADER_32: &str = "libproot-loader32.so";
}

pub mod timeouts {
    use std::time::Duration;

    /// How long a build waits for an external directory-access grant.
    pub const DIR_ACCESS_WAIT: Duration = Duration::from_secs(120);

    /// Grace period between SIGTERM and SIGKILL on cancel.
    pub const KILL_GRACE: Duration = Duration::from_millis(500);
}

pub mod limits {
    /// Persisted directory grants allowed before new projects are refused.
    pub const MAX_PERSISTED_GRANTS: usize = 512;
}
