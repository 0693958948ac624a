//! Integration tests for the job scheduler.
//!
//! Builds run a real `gradlew` shell script through a sandbox that maps the
//! sandbox work dir back to its bound host directory, so the full chain
//! (scheduler, orchestrator, import, executor) is exercised on the host.
//!
//! Test categories:
//! - Ordering: strict FIFO, single worker
//! - Cancellation: queued, running, unknown ids
//! - Failure handling: errors become outcomes, the worker survives

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use buildenv::jailer::Sandbox;
use buildenv::{
    BuildEnvError, BuildEnvOptions, BuildEnvResult, BuildEnvironmentBuilder, Job, JobKind,
    Scheduler, SandboxInvocation, StreamKind,
};
use tempfile::TempDir;

// ============================================================================
// TEST FIXTURES
// ============================================================================

const GRADLEW: &str = r#"#!/bin/sh
case "$1" in
    sleep) exec sleep 30 ;;
    fail) echo "BUILD FAILED in 1s" >&2 ;;
    record) echo "$2" >> "$3" ;;
esac
echo "BUILD SUCCESSFUL"
"#;

/// Runs on the host with the cwd set to whatever is bound at the work dir.
struct HostBindSandbox;

impl Sandbox for HostBindSandbox {
    fn setup(&self) -> BuildEnvResult<()> {
        Ok(())
    }

    fn wrap(&self, invocation: &SandboxInvocation) -> Command {
        let mut cmd = Command::new(&invocation.executable);
        cmd.args(&invocation.args).envs(&invocation.env);
        if let Some(bind) = invocation
            .binds
            .iter()
            .find(|b| b.sandbox == invocation.work_dir)
        {
            cmd.current_dir(&bind.host);
        }
        cmd
    }

    fn name(&self) -> &'static str {
        "host-bind"
    }
}

struct TestContext {
    scheduler: Scheduler<HostBindSandbox>,
    project: PathBuf,
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_rootfs(true)
    }

    fn with_rootfs(installed: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let project = temp_dir.path().join("sdcard/MyGame");
        fs::create_dir_all(project.join("android/build")).unwrap();
        fs::write(project.join("android/build/gradlew"), GRADLEW).unwrap();

        let options = BuildEnvOptions::with_home(temp_dir.path().join("buildenv"));
        if installed {
            let layout = options.layout();
            fs::create_dir_all(layout.rootfs_dir()).unwrap();
            fs::write(layout.rootfs_ready_file(), "custom").unwrap();
        }

        let env = BuildEnvironmentBuilder::new()
            .with_options(options)
            .with_kill_grace(Duration::from_millis(200))
            .build_with(HostBindSandbox)
            .expect("Failed to build environment");
        let scheduler = Scheduler::start(env).expect("Failed to start scheduler");

        Self {
            scheduler,
            project,
            temp_dir,
        }
    }

    fn build(&self, args: &[&str]) -> Job {
        Job::RunBuild {
            args: args.iter().map(|s| s.to_string()).collect(),
            project_path: self.project.to_string_lossy().to_string(),
            gradle_build_dir: "android/build".to_string(),
        }
    }

    fn record_file(&self) -> PathBuf {
        self.temp_dir.path().join("order.log")
    }

    fn record(&self, label: &str) -> Job {
        let log = self.record_file();
        self.build(&["record", label, &log.to_string_lossy()])
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn jobs_run_in_submission_order() {
    let ctx = TestContext::new();

    let handles: Vec<_> = ["a", "b", "c"]
        .iter()
        .enumerate()
        .map(|(i, label)| ctx.scheduler.enqueue(i as i64, ctx.record(label)).unwrap())
        .collect();

    for handle in handles {
        let outcome = handle.wait(|_, _| {});
        assert!(outcome.success(), "unexpected outcome: {:?}", outcome);
    }
    assert_eq!(read(&ctx.record_file()), "a\nb\nc\n");
}

#[test]
fn build_output_is_streamed() {
    let ctx = TestContext::new();
    let handle = ctx.scheduler.enqueue(1, ctx.build(&["fail"])).unwrap();

    let mut lines = Vec::new();
    let outcome = handle.wait(|kind, line| lines.push((kind, line.to_string())));

    assert_eq!(outcome.exit_code, 1);
    assert!(lines.contains(&(StreamKind::Info, "> Importing project files...".to_string())));
    assert!(lines.contains(&(StreamKind::Stdout, "BUILD SUCCESSFUL".to_string())));
    assert!(lines.contains(&(StreamKind::Stderr, "BUILD FAILED in 1s".to_string())));
}

#[test]
fn negative_ids_are_rejected() {
    let ctx = TestContext::new();
    let err = ctx.scheduler.enqueue(-1, Job::CleanGlobalCache).unwrap_err();
    assert!(matches!(err, BuildEnvError::InvalidArgument(_)));
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn cancel_running_and_queued_builds() {
    let ctx = TestContext::new();

    let running = ctx.scheduler.enqueue(1, ctx.build(&["sleep"])).unwrap();
    let queued = ctx.scheduler.enqueue(2, ctx.record("never")).unwrap();
    let cleanup = ctx.scheduler.enqueue(2, Job::CleanGlobalCache).unwrap();
    let after = ctx.scheduler.enqueue(3, ctx.record("after")).unwrap();

    let env = ctx.scheduler.environment().clone();
    wait_until(Duration::from_secs(10), || env.is_running());
    assert_eq!(ctx.scheduler.current(), Some((1, JobKind::RunBuild)));

    assert_eq!(ctx.scheduler.queued(), 3);
    ctx.scheduler.cancel(2);
    assert_eq!(ctx.scheduler.queued(), 2);
    let outcome = queued.wait(|_, _| {});
    assert_eq!(outcome.exit_code, 255);
    assert!(outcome.error.unwrap().contains("cancelled"));

    let started = Instant::now();
    ctx.scheduler.cancel(1);
    let outcome = running.wait(|_, _| {});
    assert_eq!(outcome.exit_code, 143);
    assert!(started.elapsed() < Duration::from_secs(10));

    // Same id, different kind: untouched.
    assert!(cleanup.wait(|_, _| {}).success());
    assert!(after.wait(|_, _| {}).success());
    assert_eq!(read(&ctx.record_file()), "after\n");
}

#[test]
fn cancel_unknown_id_is_noop() {
    let ctx = TestContext::new();

    let handle = ctx.scheduler.enqueue(5, ctx.record("kept")).unwrap();
    ctx.scheduler.cancel(99);
    ctx.scheduler.cancel(-5);

    assert!(handle.wait(|_, _| {}).success());
    assert_eq!(read(&ctx.record_file()), "kept\n");
}

// ============================================================================
// FAILURE HANDLING
// ============================================================================

#[test]
fn missing_rootfs_fails_job_not_worker() {
    let ctx = TestContext::with_rootfs(false);

    let mut stderr = Vec::new();
    let outcome = ctx
        .scheduler
        .enqueue(1, ctx.build(&["assembleDebug"]))
        .unwrap()
        .wait(|kind, line| {
            if kind == StreamKind::Stderr {
                stderr.push(line.to_string());
            }
        });

    assert_eq!(outcome.exit_code, 255);
    assert!(stderr.iter().any(|l| l.contains("Rootfs isn't installed")));

    let next = ctx.scheduler.enqueue(2, Job::CleanGlobalCache).unwrap();
    assert!(next.wait(|_, _| {}).success());
}

#[test]
fn missing_build_dir_reports_setup_failure() {
    let ctx = TestContext::new();
    let job = Job::RunBuild {
        args: vec![],
        project_path: ctx.project.to_string_lossy().to_string(),
        gradle_build_dir: "android/missing".to_string(),
    };

    let outcome = ctx.scheduler.enqueue(1, job).unwrap().wait(|_, _| {});

    assert_eq!(outcome.exit_code, 255);
    let error = outcome.error.unwrap();
    assert!(error.starts_with("Unable to setup project:"), "{}", error);
    assert!(error.contains("android/missing"));
}

#[test]
fn clean_project_forced() {
    let ctx = TestContext::new();
    assert!(
        ctx.scheduler
            .enqueue(1, ctx.build(&[]))
            .unwrap()
            .wait(|_, _| {})
            .success()
    );

    let project_path = ctx.project.to_string_lossy().to_string();
    let work_dir = ctx
        .scheduler
        .environment()
        .layout()
        .project_cache_dir(&project_path, "android/build");
    assert!(work_dir.join("gradlew").exists());

    let outcome = ctx
        .scheduler
        .enqueue(
            2,
            Job::CleanProject {
                project_path,
                gradle_build_dir: "android/build".into(),
                force: true,
            },
        )
        .unwrap()
        .wait(|_, _| {});
    assert!(outcome.success());
    assert!(!work_dir.exists());
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn shutdown_is_idempotent() {
    let ctx = TestContext::new();
    ctx.scheduler.shutdown();
    ctx.scheduler.shutdown();

    let err = ctx.scheduler.enqueue(1, Job::CleanGlobalCache).unwrap_err();
    assert!(matches!(err, BuildEnvError::Internal(_)));
}
