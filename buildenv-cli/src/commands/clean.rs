use buildenv::Job;
use clap::Args;

use crate::cli::GlobalFlags;
use crate::util::{follow, to_shell_exit_code};

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Project root directory, as passed to `build`
    #[arg(index = 1, value_name = "PROJECT")]
    pub project: String,

    /// Gradle build directory, relative to the project root
    #[arg(long, default_value = "android/build")]
    pub build_dir: String,
}

pub async fn execute(args: CleanArgs, global: &GlobalFlags) -> anyhow::Result<i32> {
    // Working dirs are keyed by the canonical path `build` used.
    let project_path = std::fs::canonicalize(&args.project)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or(args.project);

    run(
        global,
        Job::CleanProject {
            project_path,
            gradle_build_dir: args.build_dir,
            force: true,
        },
    )
    .await
}

pub async fn execute_cache(global: &GlobalFlags) -> anyhow::Result<i32> {
    run(global, Job::CleanGlobalCache).await
}

async fn run(global: &GlobalFlags, job: Job) -> anyhow::Result<i32> {
    let scheduler = global.create_scheduler()?;
    let outcome = follow(scheduler.enqueue(0, job)?).await;
    Ok(to_shell_exit_code(&outcome))
}
