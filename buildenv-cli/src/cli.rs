//! Command-line definitions and global flags.

use std::path::PathBuf;
use std::time::Duration;

use buildenv::{BuildEnvOptions, BuildEnvironmentBuilder, ProotSandbox, Scheduler};
use clap::{Args, Parser, Subcommand};

use crate::commands;

/// Run Gradle builds inside a user-space proot sandbox.
#[derive(Parser, Debug)]
#[command(name = "buildenv", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a project with Gradle inside the sandbox
    Build(commands::build::BuildArgs),
    /// Delete a project's cached working directory
    Clean(commands::clean::CleanArgs),
    /// Delete the global Gradle cache
    CleanCache,
    /// Manage the sandbox root filesystem
    #[command(subcommand)]
    Rootfs(commands::rootfs::RootfsCommand),
    /// List cached projects
    Projects(commands::projects::ProjectsArgs),
    /// Show or change settings
    Settings(commands::settings::SettingsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// buildenv home directory [default: ~/.buildenv]
    #[arg(long, global = true, env = "BUILDENV_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Directory containing libproot.so and its loaders [default: <home>/lib]
    #[arg(long, global = true, env = "BUILDENV_LIB_DIR", value_name = "DIR")]
    pub lib_dir: Option<PathBuf>,

    /// Shared storage bound into the sandbox at the same path
    #[arg(long, global = true, env = "BUILDENV_EXTERNAL_STORAGE", value_name = "DIR")]
    pub external_storage: Option<PathBuf>,

    /// Seconds to wait for project directory access
    #[arg(long, global = true, value_name = "SECS")]
    pub access_timeout: Option<u64>,
}

impl GlobalFlags {
    pub fn options(&self) -> BuildEnvOptions {
        let mut options = match &self.home {
            Some(home) => BuildEnvOptions::with_home(absolute(home)),
            None => BuildEnvOptions::default(),
        };
        options.lib_dir = self.lib_dir.as_ref().map(|p| absolute(p));
        options.external_storage = self.external_storage.as_ref().map(|p| absolute(p));
        if let Some(secs) = self.access_timeout {
            options.access_timeout = Duration::from_secs(secs);
        }
        options
    }

    pub fn create_scheduler(&self) -> anyhow::Result<Scheduler<ProotSandbox>> {
        let env = BuildEnvironmentBuilder::new()
            .with_options(self.options())
            .build()?;
        Ok(Scheduler::start(env)?)
    }
}

fn absolute(path: &std::path::Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
