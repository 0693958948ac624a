//! List cached project working directories.

use buildenv::build::ProjectInfo;
use buildenv::util::fs::format_size;
use clap::Args;
use serde::Serialize;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    /// Print JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPresenter {
    project_name: String,
    project_path: String,
    gradle_build_dir: String,
    cache_dir: String,
    size: u64,
}

pub async fn execute(args: ProjectsArgs, global: &GlobalFlags) -> anyhow::Result<i32> {
    let projects: Vec<ProjectPresenter> =
        ProjectInfo::list_cached(&global.options().layout().projects_dir())
            .into_iter()
            .map(|p| ProjectPresenter {
                size: p.size(),
                cache_dir: p.cache_dir.to_string_lossy().to_string(),
                project_name: p.info.project_name,
                project_path: p.info.project_path,
                gradle_build_dir: p.info.gradle_build_dir,
            })
            .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(0);
    }

    if projects.is_empty() {
        println!("No cached projects");
        return Ok(0);
    }
    for p in &projects {
        println!(
            "{}\t{}\t{}/{}",
            p.project_name,
            format_size(p.size),
            p.project_path,
            p.gradle_build_dir
        );
    }
    Ok(0)
}
