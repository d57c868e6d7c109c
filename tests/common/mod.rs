//! Shared integration-test harness that runs the `toolconf` binary
//! against a throwaway configuration root.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Capability listing printed by the mock `tool-b` executable.
pub const TOOL_B_LIST: &str = "debug-level:24:\"basic";

/// A temporary configuration root plus a bin directory holding mock
/// component executables.
pub struct Toolconf {
    dir: tempfile::TempDir,
    /// Configuration root passed as `--homedir`.
    pub home: PathBuf,
    /// Executable directory passed as `--bindir`.
    pub bin: PathBuf,
}

impl Toolconf {
    /// Creates the directories and the mock `tool-b` executable.
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let home = dir.path().join("home");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(&bin).unwrap();
        let this = Self { dir, home, bin };
        this.mock_tool(
            "tool-b",
            &format!("if [ \"$1\" = \"--gpgconf-list\" ]; then\n  echo '{TOOL_B_LIST}'\n  exit 0\nfi\nexit 1\n"),
        );
        this
    }

    /// Writes an executable shell script into the bin directory.
    #[allow(clippy::missing_panics_doc)]
    pub fn mock_tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    /// Path of a file under `tests/fixtures`.
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Writes a file in the configuration root.
    #[allow(clippy::missing_panics_doc)]
    pub fn write(&self, name: &str, content: &str) {
        std::fs::write(self.home.join(name), content).unwrap();
    }

    /// Reads a file from the configuration root.
    #[allow(clippy::missing_panics_doc)]
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.home.join(name)).unwrap()
    }

    /// Returns `true` if `name` exists in the configuration root.
    pub fn exists(&self, name: &str) -> bool {
        self.home.join(name).exists()
    }

    /// Root of the temporary tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Runs `toolconf` with `args` and an empty stdin.
    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_stdin(args, "")
    }

    /// Runs `toolconf` with `args`, feeding `input` on stdin.
    #[allow(clippy::missing_panics_doc)]
    pub fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let bin = env!("CARGO_BIN_EXE_toolconf");
        let catalog = Self::fixture_path("two_tools.yaml");
        let mut child = Command::new(bin)
            .arg("--homedir")
            .arg(&self.home)
            .arg("--bindir")
            .arg(&self.bin)
            .arg("--catalog")
            .arg(&catalog)
            .arg("--global-config")
            .arg(self.home.join("gpgconf.conf"))
            .arg("--quiet")
            .args(args)
            .env_remove("TOOLCONF_LOG_LEVEL")
            .env_remove("TOOLCONF_QUERY_TIMEOUT")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn toolconf");

        child
            .stdin
            .take()
            .expect("stdin not captured")
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
        child.wait_with_output().expect("failed to wait for toolconf")
    }
}

/// Stdout as UTF-8 text.
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr as UTF-8 text.
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
