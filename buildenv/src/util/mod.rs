//! Logging and filesystem helpers.

pub mod fs;

use std::path::Path;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::runtime::layout::dirs;

const LOG_FILE_PREFIX: &str = "buildenv.log";

/// Install a daily-rolling file subscriber under `<home>/logs/`.
///
/// The filter comes from `RUST_LOG`, falling back to `info`. Keep the
/// returned guard alive for as long as logs should be flushed. A second
/// call in the same process keeps the first subscriber.
pub fn init_logging(home_dir: &Path) -> BuildEnvResult<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = home_dir.join(dirs::LOGS_DIR);
    std::fs::create_dir_all(&logs_dir).map_err(|e| {
        BuildEnvError::Storage(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_thread_names(true),
        )
        .try_init();

    Ok(guard)
}
