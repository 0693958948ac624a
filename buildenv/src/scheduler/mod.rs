//! Single-worker job queue.
//!
//! Jobs run strictly one at a time, in submission order, on a dedicated
//! `buildenv-worker` thread. Every job ends with exactly one
//! [`JobEvent::Finished`]: errors and panics inside a job become its
//! outcome and never take the worker down.

mod handle;

pub use handle::JobHandle;

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult, ErrorClass};
use buildenv_shared::protocol::{
    EXIT_CODE_UNAVAILABLE, Job, JobEvent, JobId, JobKind, JobOutcome, StreamKind,
};
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use crate::build::{AccessHandle, BuildEnvironment};
use crate::jailer::Sandbox;
use crate::rootfs::{GithubReleases, ReleaseSource};

/// Exit code of failed non-build jobs.
const JOB_FAILED: i32 = 1;

struct QueuedJob {
    id: JobId,
    job: Job,
    events: UnboundedSender<JobEvent>,
}

impl QueuedJob {
    fn emit(&self, kind: StreamKind, line: &str) {
        // A dropped handle just stops listening.
        let _ = self.events.send(JobEvent::Output {
            kind,
            line: line.to_string(),
        });
    }

    fn finish(&self, outcome: JobOutcome) {
        let _ = self.events.send(JobEvent::Finished(outcome));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CurrentJob {
    id: JobId,
    kind: JobKind,
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<QueuedJob>,
    stopping: bool,
}

struct Shared<S: Sandbox> {
    env: Arc<BuildEnvironment<S>>,
    releases: Arc<dyn ReleaseSource>,
    // Lock order: queue, then current.
    queue: Mutex<Queue>,
    available: Condvar,
    current: Mutex<Option<CurrentJob>>,
}

pub struct Scheduler<S: Sandbox + 'static> {
    shared: Arc<Shared<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Sandbox + 'static> Scheduler<S> {
    /// Start the worker. Rootfs installs download from GitHub.
    pub fn start(env: BuildEnvironment<S>) -> BuildEnvResult<Self> {
        Self::start_with(env, Arc::new(GithubReleases::new()))
    }

    pub fn start_with(
        env: BuildEnvironment<S>,
        releases: Arc<dyn ReleaseSource>,
    ) -> BuildEnvResult<Self> {
        let shared = Arc::new(Shared {
            env: Arc::new(env),
            releases,
            queue: Mutex::new(Queue::default()),
            available: Condvar::new(),
            current: Mutex::new(None),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("buildenv-worker".to_string())
            .spawn(move || worker_loop(&worker_shared))
            .map_err(|e| BuildEnvError::Internal(format!("Failed to spawn worker: {}", e)))?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn environment(&self) -> &Arc<BuildEnvironment<S>> {
        &self.shared.env
    }

    /// Append a job. `id` must be non-negative.
    pub fn enqueue(&self, id: JobId, job: Job) -> BuildEnvResult<JobHandle> {
        if id < 0 {
            return Err(BuildEnvError::InvalidArgument(format!(
                "job id must be non-negative, got {}",
                id
            )));
        }

        let (events, rx) = unbounded_channel();
        let mut queue = self.shared.queue.lock();
        if queue.stopping {
            return Err(BuildEnvError::Internal("scheduler is shut down".into()));
        }
        tracing::debug!(id, kind = ?job.kind(), queued = queue.jobs.len(), "Job enqueued");
        queue.jobs.push_back(QueuedJob { id, job, events });
        self.shared.available.notify_one();

        Ok(JobHandle::new(id, rx))
    }

    /// Cancel build `id`: kill it if running, drop it if still queued.
    ///
    /// Unknown and negative ids are ignored.
    pub fn cancel(&self, id: JobId) {
        if id < 0 {
            return;
        }

        let removed: VecDeque<QueuedJob> = {
            let mut queue = self.shared.queue.lock();
            let (removed, kept) = std::mem::take(&mut queue.jobs)
                .into_iter()
                .partition(|q| q.id == id && q.job.kind() == JobKind::RunBuild);
            queue.jobs = kept;
            removed
        };
        for job in &removed {
            tracing::info!(id, "Queued build cancelled");
            job.finish(JobOutcome::failed(
                EXIT_CODE_UNAVAILABLE,
                "Build cancelled before it started",
            ));
        }

        // Held across kill so the worker cannot move on to another job.
        let current = self.shared.current.lock();
        if *current
            == Some(CurrentJob {
                id,
                kind: JobKind::RunBuild,
            })
        {
            tracing::info!(id, "Cancelling running build");
            self.shared.env.kill();
        }
    }

    /// Deliver a directory-access grant to a waiting build.
    pub fn grant_directory_access(&self, handle: AccessHandle) {
        self.shared.env.grant_directory_access(handle);
    }

    /// Id and kind of the running job.
    pub fn current(&self) -> Option<(JobId, JobKind)> {
        self.shared.current.lock().map(|c| (c.id, c.kind))
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Stop after the current job. Queued jobs finish with 255.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let pending = {
            let mut queue = self.shared.queue.lock();
            queue.stopping = true;
            self.shared.available.notify_all();
            std::mem::take(&mut queue.jobs)
        };
        for job in pending {
            job.finish(JobOutcome::failed(
                EXIT_CODE_UNAVAILABLE,
                "Scheduler shut down before the job started",
            ));
        }

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
            tracing::debug!("Scheduler stopped");
        }
    }
}

impl<S: Sandbox + 'static> Drop for Scheduler<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<S: Sandbox>(shared: &Shared<S>) {
    loop {
        let queued = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.stopping {
                    return;
                }
                if let Some(job) = queue.jobs.pop_front() {
                    *shared.current.lock() = Some(CurrentJob {
                        id: job.id,
                        kind: job.job.kind(),
                    });
                    break job;
                }
                shared.available.wait(&mut queue);
            }
        };

        let span = tracing::info_span!("job", id = queued.id, kind = ?queued.job.kind());
        let _enter = span.enter();

        let outcome = match catch_unwind(AssertUnwindSafe(|| dispatch(shared, &queued))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = format!("Job panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(%message);
                queued.emit(StreamKind::Stderr, &message);
                JobOutcome::failed(EXIT_CODE_UNAVAILABLE, message)
            }
        };

        tracing::info!(exit_code = outcome.exit_code, "Job finished");
        *shared.current.lock() = None;
        queued.finish(outcome);
    }
}

fn dispatch<S: Sandbox>(shared: &Shared<S>, queued: &QueuedJob) -> JobOutcome {
    let env = &shared.env;
    let sink = |kind: StreamKind, line: &str| queued.emit(kind, line);
    let progress = |line: &str| queued.emit(StreamKind::Info, line);

    match &queued.job {
        Job::RunBuild {
            args,
            project_path,
            gradle_build_dir,
        } => match env.execute_gradle(args, project_path, gradle_build_dir, &sink) {
            Ok(code) => JobOutcome::exit(code),
            Err(e) => failed(queued, EXIT_CODE_UNAVAILABLE, &e, build_error_message(&e)),
        },
        Job::CleanProject {
            project_path,
            gradle_build_dir,
            force,
        } => match env.clean_project(project_path, gradle_build_dir, *force) {
            Ok(_) => JobOutcome::exit(0),
            Err(e) => failed(queued, JOB_FAILED, &e, e.to_string()),
        },
        Job::CleanGlobalCache => match env.clean_global_cache() {
            Ok(()) => JobOutcome::exit(0),
            Err(e) => failed(queued, JOB_FAILED, &e, e.to_string()),
        },
        Job::InstallRootfs { archive } => {
            match env
                .rootfs()
                .install(archive.as_deref(), shared.releases.as_ref(), &progress)
            {
                Ok(_) => JobOutcome::exit(0),
                Err(e) => failed(
                    queued,
                    JOB_FAILED,
                    &e,
                    format!("Rootfs installation failed: {}", e),
                ),
            }
        }
        Job::DeleteRootfs => match env.rootfs().delete() {
            Ok(()) => JobOutcome::exit(0),
            Err(e) => failed(queued, JOB_FAILED, &e, e.to_string()),
        },
    }
}

/// Configuration problems and spawn failures are reported as is. Anything
/// else went wrong while preparing the project.
fn build_error_message(e: &BuildEnvError) -> String {
    match (e.class(), e) {
        (ErrorClass::Configuration, _) | (_, BuildEnvError::Spawn(_)) => e.to_string(),
        _ => format!("Unable to setup project: {}", e),
    }
}

fn failed(queued: &QueuedJob, exit_code: i32, e: &BuildEnvError, message: String) -> JobOutcome {
    tracing::warn!(class = ?e.class(), error = %message, "Job failed");
    queued.emit(StreamKind::Stderr, &message);
    JobOutcome::failed(exit_code, message)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let panic = catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(panic.as_ref()), "boom");

        let panic = catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(panic.as_ref()), "formatted 1");
    }

    #[test]
    fn test_build_error_message() {
        assert_eq!(
            build_error_message(&BuildEnvError::RootfsNotInstalled),
            BuildEnvError::RootfsNotInstalled.to_string()
        );
        assert_eq!(
            build_error_message(&BuildEnvError::Spawn("ENOENT".into())),
            "failed to spawn process: ENOENT"
        );
        assert_eq!(
            build_error_message(&BuildEnvError::NotFound("Gradle build dir not found: /p".into())),
            "Unable to setup project: not found: Gradle build dir not found: /p"
        );
        assert!(
            build_error_message(&BuildEnvError::AccessTimeout)
                .starts_with("Unable to setup project: Directory access not granted")
        );
    }
}
