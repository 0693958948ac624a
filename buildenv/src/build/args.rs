//! Gradle argument rewriting and command assembly.
//!
//! Callers pass arguments with host paths. Inside the sandbox the project
//! lives at `/project`, so path-valued properties are pointed there.

use crate::runtime::constants::sandbox;

const DEBUG_KEYSTORE: &str = "-Pdebug_keystore_file=";
const RELEASE_KEYSTORE: &str = "-Prelease_keystore_file=";
const ADDONS_DIRECTORY: &str = "-Paddons_directory=";
const PLUGINS_LOCAL_BINARIES: &str = "-Pplugins_local_binaries=";

const NO_DAEMON: &str = "--no-daemon";

/// Map host paths in `args` to their sandbox locations.
pub fn rewrite_gradle_args(project_path: &str, args: &[String]) -> Vec<String> {
    let host_addons = format!(
        "{}/{}",
        project_path.trim_end_matches('/'),
        crate::runtime::constants::project::ADDONS_DIR_NAME
    );

    args.iter()
        .map(|arg| {
            if arg.starts_with(DEBUG_KEYSTORE) {
                format!("{}{}", DEBUG_KEYSTORE, sandbox::DEBUG_KEYSTORE)
            } else if arg.starts_with(RELEASE_KEYSTORE) {
                format!("{}{}", RELEASE_KEYSTORE, sandbox::RELEASE_KEYSTORE)
            } else if arg.starts_with(ADDONS_DIRECTORY) {
                format!("{}{}", ADDONS_DIRECTORY, sandbox::ADDONS_DIR)
            } else if let Some(value) = arg.strip_prefix(PLUGINS_LOCAL_BINARIES) {
                format!(
                    "{}{}",
                    PLUGINS_LOCAL_BINARIES,
                    value.replace(&host_addons, sandbox::ADDONS_DIR)
                )
            } else {
                arg.clone()
            }
        })
        .collect()
}

/// `bash gradlew <args>`, with `--no-daemon` appended unless present.
pub fn gradle_command(args: &[String]) -> String {
    let mut cmd = String::from("bash gradlew");
    for arg in args {
        cmd.push(' ');
        cmd.push_str(&shell_quote(arg));
    }
    if !args.iter().any(|a| a == NO_DAEMON) {
        cmd.push(' ');
        cmd.push_str(NO_DAEMON);
    }
    cmd
}

/// Single-quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rewrite_paths() {
        let args = strings(&[
            "assembleRelease",
            "-Pdebug_keystore_file=/sdcard/keys/debug.keystore",
            "-Prelease_keystore_file=/sdcard/keys/release.keystore",
            "-Paddons_directory=/sdcard/MyGame/addons",
            "-Pplugins_local_binaries=/sdcard/MyGame/addons/a.aar|/sdcard/MyGame/addons/b.aar",
            "-Prelease_keystore_password=secret",
        ]);

        let rewritten = rewrite_gradle_args("/sdcard/MyGame/", &args);

        assert_eq!(
            rewritten,
            strings(&[
                "assembleRelease",
                "-Pdebug_keystore_file=/project/.android/debug.keystore",
                "-Prelease_keystore_file=/project/.android/release.keystore",
                "-Paddons_directory=/project/addons",
                "-Pplugins_local_binaries=/project/addons/a.aar|/project/addons/b.aar",
                "-Prelease_keystore_password=secret",
            ])
        );
    }

    #[test]
    fn test_plugins_outside_project_untouched() {
        let args = strings(&["-Pplugins_local_binaries=/sdcard/Other/addons/x.aar"]);
        assert_eq!(rewrite_gradle_args("/sdcard/MyGame", &args), args);
    }

    #[test]
    fn test_gradle_command_appends_no_daemon() {
        assert_eq!(
            gradle_command(&strings(&["assembleDebug"])),
            "bash gradlew 'assembleDebug' --no-daemon"
        );
        assert_eq!(
            gradle_command(&strings(&["--no-daemon", "build"])),
            "bash gradlew '--no-daemon' 'build'"
        );
        assert_eq!(gradle_command(&[]), "bash gradlew --no-daemon");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's $HOME"), r"'it'\''s $HOME'");
    }
}
