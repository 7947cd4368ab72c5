//! Test helpers for end-to-end daemon/CLI specifications (spec.md §8).
//!
//! `jobletd` has no CLI-managed lifecycle (no `daemon start`/`stop`
//! subcommand): each spec spawns its own daemon against a throwaway root and
//! kills it on drop, then drives it exclusively through the `joblet` binary.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};

pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Resolves a workspace binary, falling back to the path relative to the
/// test binary itself when `CARGO_MANIFEST_DIR` doesn't line up with the
/// shared target directory a runner built into.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

fn jobletd_binary() -> PathBuf {
    binary_path("jobletd")
}

fn joblet_binary() -> PathBuf {
    binary_path("joblet")
}

/// Polls `condition` until it returns true or `timeout_ms` elapses.
pub fn wait_for<F: FnMut() -> bool>(timeout_ms: u64, mut condition: F) -> bool {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let poll = std::time::Duration::from_millis(SPEC_POLL_INTERVAL_MS);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll);
    }
    false
}

/// A `jobletd` process bound to a throwaway root, killed on drop.
///
/// Running jobs requires the privileges spec.md §4.2 assumes (new user/pid/
/// mount/net namespaces plus a writable cgroup v2 delegate) — these specs are
/// meant to run as part of a privileged CI lane, the same way the daemon
/// itself expects to run in production.
pub struct Daemon {
    root: tempfile::TempDir,
    socket_path: PathBuf,
    child: Child,
}

impl Daemon {
    pub fn start() -> Self {
        let root = tempfile::tempdir().unwrap();
        let socket_path = root.path().join("jobletd.sock");
        let config_path = root.path().join("jobletd.toml");
        let config = format!(
            r#"
socket_path = "{socket}"
cgroup_root = "{cgroup}"
runtime_root = "{runtime}"
log_root = "{log}"
jobs_root = "{jobs}"
wal_path = "{wal}"
volumes_root = "{volumes}"
"#,
            socket = socket_path.display(),
            cgroup = root.path().join("cgroup").display(),
            runtime = root.path().join("runtimes").display(),
            log = root.path().join("logs").display(),
            jobs = root.path().join("jobs").display(),
            wal = root.path().join("state/jobs.wal").display(),
            volumes = root.path().join("volumes").display(),
        );
        std::fs::write(&config_path, config).unwrap();

        let child = Command::new(jobletd_binary())
            .arg(&config_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("jobletd should start");

        let daemon = Self { root, socket_path, child };
        let up = wait_for(SPEC_WAIT_MAX_MS, || daemon.socket_path.exists());
        assert!(up, "jobletd did not create its socket in time");
        daemon
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Builds a `joblet` invocation pointed at this daemon's socket.
    pub fn cli(&self) -> CliBuilder {
        CliBuilder::new(self.socket_path.clone())
    }

    /// Runs `job run <command> <args...>` and returns the accepted job id.
    pub fn run_job(&self, args: &[&str]) -> String {
        let mut full = vec!["job", "run"];
        full.extend_from_slice(args);
        let stdout = self.cli().args(&full).passes().stdout();
        parse_accepted_id(&stdout, "job accepted: ")
    }

    /// Waits until `job status <id>` reports one of `terminal_statuses`.
    pub fn wait_for_job_terminal(&self, id: &str) -> serde_json::Value {
        let mut last = serde_json::Value::Null;
        let done = wait_for(SPEC_WAIT_MAX_MS, || {
            let stdout = self.cli().args(&["job", "status", id, "--format", "json"]).passes().stdout();
            match serde_json::from_str::<serde_json::Value>(&stdout) {
                Ok(value) => {
                    let terminal = matches!(
                        value["status"].as_str(),
                        Some("completed") | Some("failed") | Some("stopped")
                    );
                    last = value;
                    terminal
                }
                Err(_) => false,
            }
        });
        assert!(done, "job {id} did not reach a terminal status in time");
        last
    }
}

fn parse_accepted_id(stdout: &str, prefix: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .unwrap_or_else(|| panic!("expected `{prefix}<uuid>` in stdout, got:\n{stdout}"))
        .trim()
        .to_string()
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct CliBuilder {
    socket_path: PathBuf,
    args: Vec<String>,
}

impl CliBuilder {
    fn new(socket_path: PathBuf) -> Self {
        Self { socket_path, args: Vec::new() }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(joblet_binary());
        cmd.arg("--socket").arg(&self.socket_path);
        cmd.args(&self.args);
        cmd
    }

    /// Escape hatch for specs that need to drive the child process
    /// incrementally (e.g. a slow log reader) instead of via `passes`/`fails`.
    pub fn into_command(self) -> Command {
        self.command()
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("joblet should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("joblet should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        assert!(self.stdout().contains(expected), "stdout does not contain {expected:?}\nstdout: {}", self.stdout());
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        assert!(self.stderr().contains(expected), "stderr does not contain {expected:?}\nstderr: {}", self.stderr());
        self
    }
}
