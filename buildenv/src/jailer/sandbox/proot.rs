//! ProotSandbox: runs commands chrooted into the installed rootfs.

use std::path::Path;
use std::process::Command;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};

use super::{Sandbox, SandboxInvocation};
use crate::jailer::proot::ProotCommand;
use crate::runtime::constants::{envs, rootfs};
use crate::runtime::layout::FilesystemLayout;

#[derive(Debug)]
pub struct ProotSandbox {
    layout: FilesystemLayout,
}

impl ProotSandbox {
    pub fn new(layout: FilesystemLayout) -> Self {
        Self { layout }
    }

    /// `NAME=value` lines from `<rootfs>/env`. Re-read on every launch
    /// since the rootfs can be reinstalled underneath us.
    fn default_env(&self) -> Vec<String> {
        read_env_file(&self.layout.rootfs_dir().join(rootfs::ENV_FILE))
    }
}

/// Missing or unreadable file yields an empty environment.
fn read_env_file(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Err(e) => {
            tracing::info!(
                path = %path.display(),
                error = %e,
                "Unable to read rootfs default environment"
            );
            Vec::new()
        }
    }
}

impl Sandbox for ProotSandbox {
    fn setup(&self) -> BuildEnvResult<()> {
        let tmp = self.layout.proot_tmp_dir();
        std::fs::create_dir_all(&tmp).map_err(|e| {
            BuildEnvError::Storage(format!(
                "Failed to create proot tmp dir {}: {}",
                tmp.display(),
                e
            ))
        })
    }

    fn wrap(&self, invocation: &SandboxInvocation) -> Command {
        let mut proot = ProotCommand::new(self.layout.proot_binary());
        proot
            .rootfs(self.layout.rootfs_dir())
            .workdir(&invocation.work_dir);

        for bind in &invocation.binds {
            proot.bind(&bind.host, &bind.sandbox);
            tracing::trace!(
                host = %bind.host.display(),
                sandbox = %bind.sandbox.display(),
                "proot: bind"
            );
        }

        for line in self.default_env() {
            proot.env_line(line);
        }
        for (key, value) in &invocation.env {
            proot.setenv(key, value);
        }

        let mut cmd = proot.build(&invocation.executable, &invocation.args);
        cmd.env(envs::PROOT_TMP_DIR, self.layout.proot_tmp_dir())
            .env(envs::PROOT_LOADER, self.layout.proot_loader())
            .env(envs::PROOT_LOADER_32, self.layout.proot_loader_32())
            .current_dir(self.layout.home_dir());
        cmd
    }

    fn name(&self) -> &'static str {
        "proot"
    }
}
