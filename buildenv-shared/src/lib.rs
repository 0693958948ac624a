//! Shared types for buildenv.
//!
//! Error taxonomy, the job protocol spoken between callers and the
//! scheduler, and the filesystem/sandbox layout contract.

pub mod constants;
pub mod errors;
pub mod protocol;

pub use errors::{BuildEnvError, BuildEnvResult, ErrorClass};
pub use protocol::{Job, JobEvent, JobId, JobKind, JobOutcome, StreamKind};
