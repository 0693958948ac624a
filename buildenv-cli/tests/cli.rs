use predicates::prelude::*;

mod common;

#[test]
fn test_rootfs_status_not_installed() {
    let mut ctx = common::buildenv();
    ctx.cmd.args(["rootfs", "status"]);
    ctx.cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"));
}

#[test]
fn test_build_without_rootfs() {
    let mut ctx = common::buildenv();
    let project = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(project.path().join("android/build")).unwrap();

    ctx.cmd
        .arg("build")
        .arg(project.path())
        .args(["--", "assembleDebug"]);
    ctx.cmd
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Rootfs isn't installed"));
}

#[test]
fn test_build_missing_project() {
    let mut ctx = common::buildenv();
    let missing = ctx.home_path().join("no-such-project");

    ctx.cmd.arg("build").arg(&missing);
    ctx.cmd
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project path not found"));
}

#[test]
fn test_projects_empty() {
    let mut ctx = common::buildenv();
    ctx.cmd.arg("projects");
    ctx.cmd
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached projects"));

    ctx.new_cmd()
        .args(["projects", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_settings_roundtrip() {
    let mut ctx = common::buildenv();
    ctx.cmd.arg("settings");
    ctx.cmd
        .assert()
        .success()
        .stdout("clear_cache_after_build = false\n");

    ctx.new_cmd()
        .args(["settings", "--clear-cache-after-build", "true"])
        .assert()
        .success();

    ctx.new_cmd()
        .arg("settings")
        .assert()
        .success()
        .stdout("clear_cache_after_build = true\n");
}

#[test]
fn test_clean_cache_succeeds() {
    let mut ctx = common::buildenv();
    let cache = ctx.home_path().join("global-gradle-cache/caches");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join("entry"), b"x").unwrap();

    ctx.cmd.arg("clean-cache");
    ctx.cmd.assert().success();
    assert!(!ctx.home_path().join("global-gradle-cache").exists());
}

#[test]
fn test_install_garbage_archive() {
    let mut ctx = common::buildenv();
    let archive = ctx.home_path().join("garbage.tar.xz");
    std::fs::write(&archive, b"definitely not xz").unwrap();

    ctx.cmd.args(["rootfs", "install", "--archive"]).arg(&archive);
    ctx.cmd
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Rootfs installation failed"));

    ctx.new_cmd()
        .args(["rootfs", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"));
}

#[test]
fn test_rootfs_delete_when_missing() {
    let mut ctx = common::buildenv();
    ctx.cmd.args(["rootfs", "delete"]);
    ctx.cmd.assert().success();
}
