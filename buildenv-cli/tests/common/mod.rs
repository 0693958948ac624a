#![allow(dead_code)]

use assert_cmd::Command;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub home: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        command_for(&self.home)
    }

    pub fn home_path(&self) -> &std::path::Path {
        self.home.path()
    }
}

fn command_for(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("buildenv").unwrap();
    cmd.env("BUILDENV_HOME", home.path())
        .env_remove("BUILDENV_LIB_DIR")
        .env_remove("BUILDENV_EXTERNAL_STORAGE")
        .env_remove("RUST_LOG");
    cmd
}

/// A `buildenv` command with an isolated, empty home directory.
pub fn buildenv() -> TestContext {
    let home = tempfile::tempdir().unwrap();
    let cmd = command_for(&home);
    TestContext { cmd, home }
}
