use buildenv::Settings;
use clap::Args;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Delete a project's working directory after each build
    #[arg(long, value_name = "BOOL")]
    pub clear_cache_after_build: Option<bool>,
}

pub async fn execute(args: SettingsArgs, global: &GlobalFlags) -> anyhow::Result<i32> {
    let path = global.options().layout().settings_file();
    let mut settings = Settings::load(&path);

    if let Some(clear) = args.clear_cache_after_build {
        settings.clear_cache_after_build = clear;
        settings.save(&path)?;
    }

    println!("clear_cache_after_build = {}", settings.clear_cache_after_build);
    Ok(0)
}
