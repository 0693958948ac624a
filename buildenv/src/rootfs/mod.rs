//! Sandbox root filesystem: archive extraction, install lifecycle and
//! release lookup.

pub mod extract;
pub mod manager;
pub mod release;

pub use extract::{Compression, ExtractStats, extract, extract_file};
pub use manager::RootfsManager;
pub use release::{GithubReleases, Progress, Release, ReleaseSource};
