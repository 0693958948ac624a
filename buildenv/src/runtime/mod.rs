pub mod constants;
pub mod layout;
pub mod options;

pub use layout::{FilesystemLayout, project_identity};
pub use options::{BuildEnvOptions, Settings};
