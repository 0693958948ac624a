//! Rootfs install, delete and status.

use std::path::PathBuf;

use buildenv::{GithubReleases, Job, RootfsManager};
use clap::{Args, Subcommand};

use crate::cli::GlobalFlags;
use crate::util::{follow, to_shell_exit_code};

#[derive(Subcommand, Debug)]
pub enum RootfsCommand {
    /// Install the rootfs, replacing any existing one
    Install(InstallArgs),
    /// Delete the installed rootfs
    Delete,
    /// Show the installed rootfs version
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Install from a local .tar.xz/.tar.gz/.tar.zst/.tar instead of the latest release
    #[arg(long, value_name = "FILE")]
    pub archive: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also check GitHub for a newer release
    #[arg(long)]
    pub check_updates: bool,
}

pub async fn execute(command: RootfsCommand, global: &GlobalFlags) -> anyhow::Result<i32> {
    match command {
        RootfsCommand::Install(args) => {
            let archive = args
                .archive
                .map(|p| std::path::absolute(&p).unwrap_or(p));
            run(global, Job::InstallRootfs { archive }).await
        }
        RootfsCommand::Delete => run(global, Job::DeleteRootfs).await,
        RootfsCommand::Status(args) => status(args, global).await,
    }
}

async fn run(global: &GlobalFlags, job: Job) -> anyhow::Result<i32> {
    let scheduler = global.create_scheduler()?;
    let outcome = follow(scheduler.enqueue(0, job)?).await;
    Ok(to_shell_exit_code(&outcome))
}

async fn status(args: StatusArgs, global: &GlobalFlags) -> anyhow::Result<i32> {
    let manager = RootfsManager::new(global.options().layout());

    let Some(version) = manager.version() else {
        println!("Rootfs: not installed");
        return Ok(0);
    };
    println!("Rootfs: installed ({})", version);
    println!("Path: {}", manager.rootfs_dir().display());

    if args.check_updates {
        let update = tokio::task::spawn_blocking(move || {
            manager.check_for_update(&GithubReleases::new())
        })
        .await?;
        match update {
            Some(latest) => println!("Update available: {}", latest),
            None => println!("Up to date"),
        }
    }
    Ok(0)
}
