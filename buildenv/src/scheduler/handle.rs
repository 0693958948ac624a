//! Caller side of a queued job.

use buildenv_shared::protocol::{EXIT_CODE_UNAVAILABLE, JobEvent, JobId, JobOutcome, StreamKind};
use tokio::sync::mpsc::UnboundedReceiver;

/// Event stream of one enqueued job.
///
/// Yields output lines, then exactly one [`JobEvent::Finished`].
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    events: UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    pub(super) fn new(id: JobId, events: UnboundedReceiver<JobEvent>) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Next event, `None` once the stream is exhausted.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Blocking [`recv`](Self::recv). Panics inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<JobEvent> {
        self.events.blocking_recv()
    }

    /// Block until the job finishes, passing output lines to `on_output`.
    pub fn wait(mut self, mut on_output: impl FnMut(StreamKind, &str)) -> JobOutcome {
        while let Some(event) = self.events.blocking_recv() {
            match event {
                JobEvent::Output { kind, line } => on_output(kind, &line),
                JobEvent::Finished(outcome) => return outcome,
            }
        }
        dropped()
    }

    /// Async [`wait`](Self::wait).
    pub async fn finished(mut self, mut on_output: impl FnMut(StreamKind, &str)) -> JobOutcome {
        while let Some(event) = self.events.recv().await {
            match event {
                JobEvent::Output { kind, line } => on_output(kind, &line),
                JobEvent::Finished(outcome) => return outcome,
            }
        }
        dropped()
    }
}

fn dropped() -> JobOutcome {
    JobOutcome::failed(EXIT_CODE_UNAVAILABLE, "job dropped without a result")
}
