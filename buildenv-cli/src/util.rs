//! Utility functions shared across commands

use buildenv::{JobHandle, JobOutcome, StreamKind};

/// Print a job output line: stderr lines to stderr, the rest to stdout.
pub fn print_line(kind: StreamKind, line: &str) {
    match kind {
        StreamKind::Stderr => eprintln!("{}", line),
        StreamKind::Stdout | StreamKind::Info => println!("{}", line),
    }
}

/// Stream a job's output to the terminal until it finishes.
pub async fn follow(handle: JobHandle) -> JobOutcome {
    handle.finished(print_line).await
}

/// Convert a job outcome to a shell exit code.
///
/// A job that reports success alongside an error exits 1. Codes outside
/// `0..=255` become 255.
pub fn to_shell_exit_code(outcome: &JobOutcome) -> i32 {
    match outcome.exit_code {
        0 if outcome.error.is_some() => 1,
        code if (0..=255).contains(&code) => code,
        _ => 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_shell_exit_code_success() {
        assert_eq!(to_shell_exit_code(&JobOutcome::exit(0)), 0);
    }

    #[test]
    fn test_to_shell_exit_code_failure() {
        assert_eq!(to_shell_exit_code(&JobOutcome::exit(1)), 1);
        assert_eq!(to_shell_exit_code(&JobOutcome::exit(143)), 143);
        assert_eq!(to_shell_exit_code(&JobOutcome::failed(255, "x")), 255);
    }

    #[test]
    fn test_to_shell_exit_code_out_of_range() {
        assert_eq!(to_shell_exit_code(&JobOutcome::exit(-1)), 255);
        assert_eq!(to_shell_exit_code(&JobOutcome::exit(300)), 255);
        assert_eq!(to_shell_exit_code(&JobOutcome::failed(0, "partial")), 1);
    }
}
