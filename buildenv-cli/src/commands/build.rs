use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use buildenv::{Job, JobId};
use clap::Args;

use crate::cli::GlobalFlags;
use crate::util::{follow, to_shell_exit_code};

const BUILD_JOB: JobId = 0;
const CLEAN_JOB: JobId = 1;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project root directory
    #[arg(index = 1, value_name = "PROJECT")]
    pub project: PathBuf,

    /// Gradle build directory, relative to the project root
    #[arg(long, default_value = "android/build")]
    pub build_dir: String,

    /// Arguments passed to gradlew
    #[arg(index = 2, last = true)]
    pub gradle_args: Vec<String>,
}

/// Run the build, then the post-build clean (honours
/// `clear_cache_after_build`). Ctrl-C cancels the build.
pub async fn execute(args: BuildArgs, global: &GlobalFlags) -> anyhow::Result<i32> {
    let project = std::fs::canonicalize(&args.project)
        .with_context(|| format!("Project path not found: {}", args.project.display()))?;
    let project_path = project.to_string_lossy().to_string();

    let scheduler = Arc::new(global.create_scheduler()?);
    let handle = scheduler.enqueue(
        BUILD_JOB,
        Job::RunBuild {
            args: args.gradle_args,
            project_path: project_path.clone(),
            gradle_build_dir: args.build_dir.clone(),
        },
    )?;

    let canceller = Arc::clone(&scheduler);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling build...");
            canceller.cancel(BUILD_JOB);
        }
    });

    let outcome = follow(handle).await;
    ctrl_c.abort();

    let clean = scheduler.enqueue(
        CLEAN_JOB,
        Job::CleanProject {
            project_path,
            gradle_build_dir: args.build_dir,
            force: false,
        },
    )?;
    let cleaned = follow(clean).await;
    if !cleaned.success() {
        tracing::warn!(error = ?cleaned.error, "Post-build clean failed");
    }

    Ok(to_shell_exit_code(&outcome))
}
