mod cli;
mod commands;
mod util;

use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Build output owns the terminal; logs go to <home>/logs.
    let guard = match buildenv::init_logging(&cli.global.options().home_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {}", e);
            None
        }
    };

    let global = cli.global;
    let result = match cli.command {
        Command::Build(args) => commands::build::execute(args, &global).await,
        Command::Clean(args) => commands::clean::execute(args, &global).await,
        Command::CleanCache => commands::clean::execute_cache(&global).await,
        Command::Rootfs(command) => commands::rootfs::execute(command, &global).await,
        Command::Projects(args) => commands::projects::execute(args, &global).await,
        Command::Settings(args) => commands::settings::execute(args, &global).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}
