//! AAPT2 jar patching.
//!
//! Gradle downloads an `aapt2-<version>-linux.jar` whose x86 binary cannot
//! start inside the rootfs. The rootfs ships a working `aapt2`, so the
//! member is replaced in place with `jar -u`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::jailer::SandboxInvocation;
use crate::runtime::constants::{envs, sandbox};

static AAPT2_JAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^aapt2-.*-linux\.jar$")
        .unwrap_or_else(|e| unreachable!("invalid aapt2 jar pattern: {e}"))
});

/// Every `aapt2-*-linux.jar` file under `root`, sorted. Symlinks are not
/// followed.
pub fn find_aapt2_jars(root: &Path) -> Vec<PathBuf> {
    let mut jars: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| AAPT2_JAR.is_match(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    jars.sort();
    jars
}

/// Shell command that swaps the `aapt2` member of the jar at
/// `<bound_path>/<relative>` for the rootfs binary.
pub fn patch_command(bound_path: &str, relative: &Path) -> String {
    let jar = format!("{}/{}", bound_path, relative.to_string_lossy());
    format!(
        r#"jar -u -f {} -C "$(dirname "$(which aapt2)")" aapt2"#,
        super::args::shell_quote(&jar)
    )
}

/// Invocation patching `jar`, found under `host_dir`, which is bound at
/// `bound_path`.
pub fn patch_invocation(host_dir: &Path, bound_path: &str, jar: &Path) -> SandboxInvocation {
    let relative = jar.strip_prefix(host_dir).unwrap_or(jar);
    SandboxInvocation::new(sandbox::SHELL)
        .arg("-c")
        .arg(patch_command(bound_path, relative))
        .bind(host_dir, bound_path)
        .work_dir(bound_path)
        .env(envs::GRADLE_OPTS, sandbox::GRADLE_OPTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_jars_full_name_match() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let nested = root.join("caches/transforms-4/abc");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("aapt2-8.6.0-11315950-linux.jar"), "").unwrap();
        fs::write(root.join("aapt2-8.2.0-1-linux.jar"), "").unwrap();
        fs::write(root.join("aapt2-8.6.0-osx.jar"), "").unwrap();
        fs::write(root.join("aapt2-8.6.0-linux.jar.sha1"), "").unwrap();
        fs::write(root.join("my-aapt2-1-linux.jar"), "").unwrap();
        fs::create_dir_all(root.join("aapt2-dir-linux.jar")).unwrap();

        let jars = find_aapt2_jars(root);
        assert_eq!(
            jars,
            vec![
                root.join("aapt2-8.2.0-1-linux.jar"),
                nested.join("aapt2-8.6.0-11315950-linux.jar"),
            ]
        );
        assert!(find_aapt2_jars(&root.join("missing")).is_empty());
    }

    #[test]
    fn test_patch_invocation() {
        let host = Path::new("/home/u/.buildenv/global-gradle-cache");
        let jar = host.join("caches/aapt2-8.6.0-1-linux.jar");
        let inv = patch_invocation(host, "/project/?", &jar);

        assert_eq!(inv.executable, Path::new("/bin/bash"));
        assert_eq!(
            inv.args,
            vec![
                "-c".to_string(),
                r#"jar -u -f '/project/?/caches/aapt2-8.6.0-1-linux.jar' -C "$(dirname "$(which aapt2)")" aapt2"#
                    .to_string(),
            ]
        );
        assert_eq!(inv.binds.len(), 1);
        assert_eq!(inv.binds[0].host, host);
        assert_eq!(inv.work_dir, Path::new("/project/?"));
        assert_eq!(
            inv.env.get("GRADLE_OPTS").map(String::as_str),
            Some("-Djava.io.tmpdir=/alt-tmp")
        );
    }
}
