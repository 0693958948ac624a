//! proot command builder.
//!
//! proot is a user-space chroot: it intercepts syscalls with ptrace and
//! rewrites paths, so no namespaces or privileges are needed. The command
//! it runs looks like:
//!
//! ```text
//! libproot.so -R <rootfs> -w <workdir> -b <host>:<guest> ... \
//!     /usr/bin/env -i NAME=value ... <executable> <args...>
//! ```
//!
//! `env -i` starts the sandboxed program from an empty environment, so
//! the rootfs default environment and any per-invocation variables are
//! passed explicitly as `NAME=value` words.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::runtime::constants::sandbox;

/// Builder for proot command arguments.
///
/// Non-consuming: every method takes `&mut self`, so a builder can be
/// filled in across conditionals without reassignment.
#[derive(Debug, Clone)]
pub struct ProotCommand {
    proot: PathBuf,
    args: Vec<String>,
    env: Vec<String>,
}

impl ProotCommand {
    pub fn new(proot: impl Into<PathBuf>) -> Self {
        Self {
            proot: proot.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Guest root filesystem (`-R`).
    pub fn rootfs(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.args.push("-R".to_string());
        self.args.push(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Initial working directory inside the guest (`-w`).
    pub fn workdir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.args.push("-w".to_string());
        self.args.push(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Make host `src` visible at guest `dest` (`-b src:dest`).
    pub fn bind(&mut self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> &mut Self {
        self.args.push("-b".to_string());
        self.args.push(format!(
            "{}:{}",
            src.as_ref().to_string_lossy(),
            dest.as_ref().to_string_lossy()
        ));
        self
    }

    /// Add one raw `NAME=value` line, e.g. from the rootfs env file.
    pub fn env_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.env.push(line.into());
        self
    }

    pub fn setenv(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        self.env
            .push(format!("{}={}", key.as_ref(), value.as_ref()));
        self
    }

    /// Full argument vector for running `executable` with `args`.
    pub fn build_args(&self, executable: impl AsRef<Path>, args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + self.env.len() + args.len() + 3);
        argv.extend(self.args.iter().cloned());
        argv.push(sandbox::ENV_BINARY.to_string());
        argv.push("-i".to_string());
        argv.extend(self.env.iter().cloned());
        argv.push(executable.as_ref().to_string_lossy().to_string());
        argv.extend(args.iter().cloned());
        argv
    }

    /// Build the command. Host environment and cwd are left to the caller.
    pub fn build(&self, executable: impl AsRef<Path>, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.proot);
        cmd.args(self.build_args(executable, args));
        cmd
    }

    /// Wrapper arguments only (for testing/debugging).
    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proot_command_builder() {
        let mut proot = ProotCommand::new("/lib/libproot.so");
        proot
            .rootfs("/data/rootfs")
            .workdir("/project")
            .bind("/data/projects/abc", "/project")
            .bind("/data/global-gradle-cache", "/project/?");

        assert_eq!(
            proot.get_args(),
            &[
                "-R",
                "/data/rootfs",
                "-w",
                "/project",
                "-b",
                "/data/projects/abc:/project",
                "-b",
                "/data/global-gradle-cache:/project/?",
            ]
        );
    }

    #[test]
    fn test_env_goes_between_env_i_and_executable() {
        let mut proot = ProotCommand::new("/lib/libproot.so");
        proot
            .rootfs("/r")
            .env_line("PATH=/usr/bin:/bin")
            .setenv("GRADLE_OPTS", "-Djava.io.tmpdir=/alt-tmp");

        let argv = proot.build_args("/bin/bash", &["-c".to_string(), "true".to_string()]);
        assert_eq!(
            argv,
            vec![
                "-R",
                "/r",
                "/usr/bin/env",
                "-i",
                "PATH=/usr/bin:/bin",
                "GRADLE_OPTS=-Djava.io.tmpdir=/alt-tmp",
                "/bin/bash",
                "-c",
                "true",
            ]
        );
    }

    #[test]
    fn test_build_uses_proot_binary() {
        let mut proot = ProotCommand::new("/lib/libproot.so");
        proot.rootfs("/r");
        let cmd = proot.build("/bin/true", &[]);
        assert_eq!(cmd.get_program(), "/lib/libproot.so");
        assert_eq!(cmd.get_args().count(), 5);
    }

    #[test]
    fn test_non_consuming_pattern() {
        let mut proot = ProotCommand::new("proot");
        proot.rootfs("/r");
        if cfg!(unix) {
            proot.bind("/sdcard", "/sdcard");
        }
        proot.workdir("/");
        assert!(proot.get_args().contains(&"/sdcard:/sdcard".to_string()));
    }
}
