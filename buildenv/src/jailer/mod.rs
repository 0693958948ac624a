//! Sandboxed process execution.
//!
//! - [`proot`]: argument builder for the proot wrapper
//! - [`sandbox`]: the [`Sandbox`] trait and its implementations
//! - [`executor`]: the single-slot process runner

pub mod executor;
pub mod proot;
pub mod sandbox;

pub use executor::{OutputSink, SandboxExecutor};
pub use proot::ProotCommand;
pub use sandbox::{BindMount, NoopSandbox, ProotSandbox, Sandbox, SandboxInvocation};
