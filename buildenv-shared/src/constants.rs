//! Layout contract shared between the host side and the sandbox.

/// Fixed paths as seen from inside the sandbox.
pub mod sandbox {
    /// Where the project working directory is bound.
    pub const PROJECT_DIR: &str = "/project";

    /// Where the global Gradle cache is bound.
    ///
    /// Gradle resolves `user.home` to `?` inside the rootfs, so its cache
    /// lands under `/project/?/.gradle`.
    pub const GRADLE_CACHE_DIR: &str = "/project/?";

    pub const DEBUG_KEYSTORE: &str = "/project/.android/debug.keystore";
    pub const RELEASE_KEYSTORE: &str = "/project/.android/release.keystore";
    pub const ADDONS_DIR: &str = "/project/addons";

    /// Shell used for every command run in the sandbox.
    pub const SHELL: &str = "/bin/bash";

    /// Clean-environment prefix placed before the command.
    pub const ENV_BINARY: &str = "/usr/bin/env";

    /// JVM temp dir override passed to Gradle.
    pub const GRADLE_OPTS: &str = "-Djava.io.tmpdir=/alt-tmp";
}

/// Files and directories inside the installed root filesystem.
pub mod rootfs {
    /// Newline-separated `NAME=value` default environment.
    pub const ENV_FILE: &str = "env";

    /// Readiness marker, holds the installed version.
    pub const READY_FILE: &str = ".ready";

    pub const RESOLV_CONF: &str = "etc/resolv.conf";
    pub const RESOLV_CONF_OVERRIDE: &str = "etc/resolv.conf.override";

    /// Version recorded for rootfs installs from a local archive.
    pub const VERSION_CUSTOM: &str = "custom";

    pub const GITHUB_REPO: &str = "godotengine/android-editor-buildenv-rootfs";
    pub const ARCHIVE_FILENAME: &str = "alpine-android-35-jdk17.tar.xz";
}

/// Paths relative to a project working directory.
pub mod project {
    pub const ADDONS_DIR_NAME: &str = "addons";

    /// Exported asset directories purged before every import.
    pub const STALE_ASSET_DIRS: &[&str] = &[
        "src/main/assets",
        "assetPackInstallTime/src/main/assets",
    ];

    pub const INFO_FILENAME: &str = ".buildenv_project.json";
}
