//! Integration tests for rootfs install and delete through the scheduler.
//!
//! Test categories:
//! - Local archive install
//! - Release install through a fake release source
//! - Delete and update checks

use std::fs;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use std::sync::Arc;

use buildenv::rootfs::Progress;
use buildenv::{
    BuildEnvError, BuildEnvOptions, BuildEnvResult, BuildEnvironmentBuilder, Job, NoopSandbox,
    ReleaseSource, Scheduler, StreamKind,
};
use tempfile::TempDir;

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn rootfs_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_mode(0o755);
    dir.set_size(0);
    builder.append_data(&mut dir, "usr/bin/", &[][..]).unwrap();

    for (path, content, mode) in [
        ("usr/bin/aapt2", "#!/bin/sh\n", 0o755),
        ("env", "PATH=/usr/bin:/bin\n", 0o644),
        ("etc/resolv.conf.override", "nameserver 1.1.1.1\n", 0o644),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(mode);
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }

    let mut link = tar::Header::new_gnu();
    link.set_entry_type(tar::EntryType::Symlink);
    link.set_size(0);
    link.set_mode(0o777);
    builder
        .append_link(&mut link, "bin", "usr/bin")
        .unwrap();

    let mut hard = tar::Header::new_gnu();
    hard.set_entry_type(tar::EntryType::Link);
    hard.set_size(0);
    hard.set_mode(0o755);
    builder
        .append_link(&mut hard, "usr/bin/aapt2-hard", "usr/bin/aapt2")
        .unwrap();

    let tar = builder.into_inner().unwrap();
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// Serves [`rootfs_archive`] as release `tag`.
struct FakeReleases {
    tag: &'static str,
}

impl ReleaseSource for FakeReleases {
    fn latest_tag(&self, _repo: &str) -> BuildEnvResult<String> {
        Ok(self.tag.to_string())
    }

    fn download_latest_asset(
        &self,
        repo: &str,
        filename: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> BuildEnvResult<String> {
        assert_eq!(repo, "godotengine/android-editor-buildenv-rootfs");
        assert_eq!(filename, "alpine-android-35-jdk17.tar.xz");
        progress("> Downloading fake rootfs...");
        fs::write(dest, rootfs_archive())?;
        Ok(self.tag.to_string())
    }
}

struct Offline;

impl ReleaseSource for Offline {
    fn latest_tag(&self, _repo: &str) -> BuildEnvResult<String> {
        Err(BuildEnvError::Download("offline".into()))
    }

    fn download_latest_asset(
        &self,
        _repo: &str,
        _filename: &str,
        _dest: &Path,
        _progress: Progress<'_>,
    ) -> BuildEnvResult<String> {
        Err(BuildEnvError::Download("offline".into()))
    }
}

struct TestContext {
    scheduler: Scheduler<NoopSandbox>,
    temp_dir: TempDir,
}

impl TestContext {
    fn new(releases: Arc<dyn ReleaseSource>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let env = BuildEnvironmentBuilder::new()
            .with_options(BuildEnvOptions::with_home(temp_dir.path().join("buildenv")))
            .build_with(NoopSandbox::new())
            .expect("Failed to build environment");
        let scheduler = Scheduler::start_with(env, releases).expect("Failed to start scheduler");
        Self {
            scheduler,
            temp_dir,
        }
    }

    fn run(&self, id: i64, job: Job) -> (buildenv::JobOutcome, Vec<String>) {
        let mut info = Vec::new();
        let outcome = self.scheduler.enqueue(id, job).unwrap().wait(|kind, line| {
            if kind == StreamKind::Info {
                info.push(line.to_string());
            }
        });
        (outcome, info)
    }
}

// ============================================================================
// INSTALL
// ============================================================================

#[test]
fn install_from_local_archive() {
    let ctx = TestContext::new(Arc::new(Offline));
    let archive = ctx.temp_dir.path().join("rootfs.tar.xz");
    fs::write(&archive, rootfs_archive()).unwrap();

    let (outcome, info) = ctx.run(
        1,
        Job::InstallRootfs {
            archive: Some(archive),
        },
    );

    assert!(outcome.success(), "{:?}", outcome);
    assert_eq!(info.last().map(String::as_str), Some("> Rootfs installation complete!"));

    let rootfs = ctx.scheduler.environment().rootfs();
    assert!(rootfs.is_ready());
    assert_eq!(rootfs.version().as_deref(), Some("custom"));

    let dir = rootfs.rootfs_dir();
    let aapt2 = dir.join("usr/bin/aapt2");
    assert_eq!(fs::metadata(&aapt2).unwrap().permissions().mode() & 0o777, 0o755);
    assert_eq!(
        fs::read_link(dir.join("bin")).unwrap(),
        Path::new("usr/bin")
    );
    assert_eq!(
        fs::metadata(dir.join("usr/bin/aapt2-hard")).unwrap().ino(),
        fs::metadata(&aapt2).unwrap().ino()
    );
    assert_eq!(
        fs::read_to_string(dir.join("etc/resolv.conf")).unwrap(),
        "nameserver 1.1.1.1\n"
    );
    assert!(!dir.join("etc/resolv.conf.override").exists());
}

#[test]
fn install_latest_release() {
    let ctx = TestContext::new(Arc::new(FakeReleases { tag: "v1.4.0" }));

    let (outcome, info) = ctx.run(1, Job::InstallRootfs { archive: None });

    assert!(outcome.success(), "{:?}", outcome);
    assert!(info.contains(&"> Downloading fake rootfs...".to_string()));
    assert!(info.contains(&"> Extracting rootfs...".to_string()));

    let rootfs = ctx.scheduler.environment().rootfs();
    assert_eq!(rootfs.version().as_deref(), Some("v1.4.0"));
    assert_eq!(rootfs.check_for_update(&FakeReleases { tag: "v1.4.0" }), None);
    assert_eq!(
        rootfs.check_for_update(&FakeReleases { tag: "v1.5.0" }).as_deref(),
        Some("v1.5.0")
    );
}

#[test]
fn failed_download_fails_job() {
    let ctx = TestContext::new(Arc::new(Offline));

    let (outcome, _) = ctx.run(1, Job::InstallRootfs { archive: None });

    assert_eq!(outcome.exit_code, 1);
    assert!(outcome.error.unwrap().contains("offline"));
    assert!(!ctx.scheduler.environment().rootfs().is_ready());
}

// ============================================================================
// DELETE
// ============================================================================

#[test]
fn delete_makes_rootfs_not_ready() {
    let ctx = TestContext::new(Arc::new(FakeReleases { tag: "v2.0.0" }));
    assert!(ctx.run(1, Job::InstallRootfs { archive: None }).0.success());
    assert!(ctx.scheduler.environment().rootfs().is_ready());

    let (outcome, _) = ctx.run(2, Job::DeleteRootfs);

    assert!(outcome.success());
    let rootfs = ctx.scheduler.environment().rootfs();
    assert!(!rootfs.is_ready());
    assert!(!rootfs.rootfs_dir().exists());
    assert_eq!(rootfs.version(), None);
}
