//! Build result classification from exit code and captured stderr.

use std::sync::LazyLock;

use regex::Regex;

/// Gradle sometimes exits 0 after logging this.
const BUILD_FAILED_MARKER: &str = "BUILD FAILED";

static AAPT2_DAEMON_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AAPT2 aapt2.*Daemon startup failed")
        .unwrap_or_else(|e| unreachable!("invalid aapt2 pattern: {e}"))
});

/// Final exit code for a Gradle run.
pub fn classify(exit_code: i32, stderr: &str) -> i32 {
    if exit_code == 0 && stderr.contains(BUILD_FAILED_MARKER) {
        1
    } else {
        exit_code
    }
}

/// Whether a failed run hit the bundled AAPT2 daemon startup defect.
pub fn is_aapt2_daemon_failure(exit_code: i32, stderr: &str) -> bool {
    exit_code != 0 && AAPT2_DAEMON_FAILURE.is_match(stderr)
}
