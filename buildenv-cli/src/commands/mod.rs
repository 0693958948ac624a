pub mod build;
pub mod clean;
pub mod projects;
pub mod rootfs;
pub mod settings;
