//! Single-slot sandboxed process executor.
//!
//! At most one wrapped process runs at a time. Its stdout and stderr are
//! drained line by line on two scoped threads and forwarded to an
//! [`OutputSink`] as they arrive. [`SandboxExecutor::kill`] can be called
//! from any thread while [`SandboxExecutor::execute`] is blocked.

use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use buildenv_shared::protocol::{EXIT_CODE_UNAVAILABLE, StreamKind};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::{Condvar, Mutex};
use regex::Regex;

use super::sandbox::{Sandbox, SandboxInvocation};
use crate::runtime::constants::timeouts;

/// Receives output lines as they are produced.
pub trait OutputSink: Send + Sync {
    fn emit(&self, kind: StreamKind, line: &str);
}

impl<F> OutputSink for F
where
    F: Fn(StreamKind, &str) + Send + Sync,
{
    fn emit(&self, kind: StreamKind, line: &str) {
        self(kind, line)
    }
}

/// Set once the child has been reaped.
#[derive(Debug, Default)]
struct ExitLatch {
    exited: Mutex<bool>,
    cond: Condvar,
}

impl ExitLatch {
    fn set(&self) {
        *self.exited.lock() = true;
        self.cond.notify_all();
    }

    /// Returns whether the latch was set within `timeout`.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut exited = self.exited.lock();
        if !*exited {
            self.cond.wait_for(&mut exited, timeout);
        }
        *exited
    }
}

#[derive(Debug)]
struct RunningProcess {
    pid: Pid,
    generation: u64,
    exited: Arc<ExitLatch>,
}

pub struct SandboxExecutor<S: Sandbox> {
    sandbox: S,
    active: Mutex<Option<RunningProcess>>,
    generation: AtomicU64,
    kill_grace: Duration,
}

impl<S: Sandbox> SandboxExecutor<S> {
    pub fn new(sandbox: S) -> Self {
        Self {
            sandbox,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
            kill_grace: timeouts::KILL_GRACE,
        }
    }

    /// Time between SIGTERM and SIGKILL on [`kill`](Self::kill).
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Run `invocation` to completion, streaming its output into `sink`.
    ///
    /// Returns `Ok(255)` without spawning when another process is active.
    /// Signal deaths map to `128 + signal`.
    pub fn execute(
        &self,
        invocation: &SandboxInvocation,
        sink: &dyn OutputSink,
    ) -> BuildEnvResult<i32> {
        let mut slot = self.active.lock();
        if slot.is_some() {
            tracing::error!("Cannot run a new process while another one is running");
            return Ok(EXIT_CODE_UNAVAILABLE);
        }

        self.sandbox.setup()?;

        let mut cmd = self.sandbox.wrap(invocation);
        tracing::debug!(
            sandbox = self.sandbox.name(),
            cmd = %redact_command(&cmd),
            "Spawning sandboxed process"
        );
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            BuildEnvError::Spawn(format!(
                "Failed to spawn {}: {}",
                cmd.get_program().to_string_lossy(),
                e
            ))
        })?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let exited = Arc::new(ExitLatch::default());
        *slot = Some(RunningProcess {
            pid: Pid::from_raw(child.id() as i32),
            generation,
            exited: Arc::clone(&exited),
        });
        drop(slot);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        std::thread::scope(|scope| {
            if let Some(out) = stdout {
                scope.spawn(move || drain_lines(out, StreamKind::Stdout, sink));
            }
            if let Some(err) = stderr {
                scope.spawn(move || drain_lines(err, StreamKind::Stderr, sink));
            }
        });

        let status = child.wait();
        exited.set();

        {
            let mut slot = self.active.lock();
            if slot.as_ref().is_some_and(|p| p.generation == generation) {
                *slot = None;
            }
        }

        let exit_code = match status {
            Ok(status) => exit_code_of(status),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to wait for sandboxed process");
                EXIT_CODE_UNAVAILABLE
            }
        };
        tracing::info!(exit_code, "Sandboxed process exited");
        Ok(exit_code)
    }

    /// Terminate the active process. No-op when idle.
    ///
    /// Sends SIGTERM at once and SIGKILL after the grace period if the
    /// process is still alive. Returns without waiting for either.
    pub fn kill(&self) {
        let Some(process) = self.active.lock().take() else {
            tracing::debug!("kill: no active process");
            return;
        };

        let pid = process.pid;
        tracing::info!(pid = pid.as_raw(), "Terminating sandboxed process");
        if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
            tracing::debug!(pid = pid.as_raw(), error = %e, "SIGTERM failed");
        }

        let grace = self.kill_grace;
        let exited = process.exited;
        let escalate = std::thread::Builder::new()
            .name("buildenv-kill".into())
            .spawn(move || {
                if !exited.wait_timeout(grace) {
                    tracing::warn!(pid = pid.as_raw(), "Process ignored SIGTERM, sending SIGKILL");
                    let _ = signal::kill(pid, Signal::SIGKILL);
                }
            });
        if let Err(e) = escalate {
            tracing::warn!(error = %e, "Failed to spawn kill escalation thread");
        }
    }
}

fn drain_lines(reader: impl Read, kind: StreamKind, sink: &dyn OutputSink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                tracing::trace!(stream = %kind, "{}", line);
                sink.emit(kind, line);
            }
            Err(e) => {
                tracing::error!(stream = %kind, error = %e, "Error reading stream");
                break;
            }
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => EXIT_CODE_UNAVAILABLE,
    }
}

// Bare argv element: the value runs to the end of the argument.
static KEYSTORE_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-P(?:debug|release)_keystore_[a-z_]+)=(?s:.*)$")
        .unwrap_or_else(|e| unreachable!("invalid keystore pattern: {e}"))
});

// Inside a single-quoted shell word: the value runs to the closing quote,
// across `'\''` escapes.
static KEYSTORE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-P(?:debug|release)_keystore_[a-z_]+)=(?:'\\''|[^'])*")
        .unwrap_or_else(|e| unreachable!("invalid keystore pattern: {e}"))
});

/// Render `cmd` as `[prog, arg, ...]` with keystore property values hidden.
pub fn redact_command(cmd: &Command) -> String {
    let parts: Vec<String> = std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| redact(&a.to_string_lossy()))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Redact one argv element, which may itself be a shell script.
fn redact(arg: &str) -> String {
    if KEYSTORE_ARG.is_match(arg) {
        return KEYSTORE_ARG.replace(arg, "$1=<REDACTED>").into_owned();
    }
    KEYSTORE_QUOTED
        .replace_all(arg, "$1=<REDACTED>")
        .into_owned()
}
