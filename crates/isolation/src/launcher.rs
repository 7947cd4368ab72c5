// SPDX-License-Identifier: MIT

//! The Isolation Launcher (IL, spec.md §4.2): the two-phase launch
//! protocol. Phases 1 and 3 run on the tokio runtime (cgroup/network setup
//! are async); the fork itself, and everything between it and the final
//! exec, runs on a dedicated blocking thread — forking a multi-threaded
//! async runtime from a worker thread is undefined behavior waiting to
//! happen, so the actual `fork()` call, and both forked images, never touch
//! tokio.
//!
//! Namespace entry needs two real (cross-process) pipes, not channels:
//! the middle process signals "namespaces unshared" before the parent
//! configures the netns by PID, and the parent hands the final exec
//! descriptor back down once the rendezvous file is in place.

use crate::descriptor::ExecDescriptor;
use crate::error::LaunchError;
use crate::mount_plan::MountEntry;
use crate::rendezvous::Rendezvous;
use joblet_cgroup::CgroupController;
use joblet_core::{JobId, ResourceRequest};
use joblet_net::NetworkOrchestrator;
use nix::sched::CloneFlags;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, pipe, ForkResult, Pid};
use std::collections::HashMap;
use std::io::{Read as _, Write as _};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Namespaces every job gets (spec.md §4.2 Phase 2): "Builder jobs identical
/// flag set, different filesystem plan" — so this is the same for both.
fn unshare_flags() -> CloneFlags {
    CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWIPC
        | CloneFlags::CLONE_NEWCGROUP
        | CloneFlags::CLONE_NEWNET
        | CloneFlags::CLONE_NEWPID
}

pub struct LaunchRequest {
    pub job_id: JobId,
    pub network_name: String,
    pub resources: ResourceRequest,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: PathBuf,
    pub uid: u32,
    pub gid: u32,
    pub hostname: String,
    pub job_root: PathBuf,
    pub mounts: Vec<MountEntry>,
}

pub struct LaunchOutcome {
    /// The real, host-visible PID of the namespace's PID 1 — the target of
    /// `stop(uuid)`'s SIGTERM/SIGKILL (spec.md §5 "Cancellation").
    pub pid: u32,
    pub cgroup_path: PathBuf,
    pub job_net: joblet_net::JobNetwork,
    /// Resolves once the reaper observes the final exit (spec.md §5:
    /// "Cleanup ... always runs when the reaper observes the last PID's
    /// exit").
    pub reaper: tokio::task::JoinHandle<ReapedExit>,
    /// Read end of the job's stdout/stderr pipes, held open across both
    /// forks so the grandchild's `dup2`'d write ends are the only other
    /// copies (spec.md §4.5: LP needs the raw bytes before they ever touch
    /// a file). Blocking `File`s — read them from a `spawn_blocking` task,
    /// same as the reaper.
    pub stdout: std::fs::File,
    pub stderr: std::fs::File,
}

pub struct ReapedExit {
    pub exit_code: i32,
}

/// Runs the two-phase protocol (spec.md §4.2). On any phase 1-3 failure,
/// unwinds per "Failure semantics": release IP, remove cgroup, delete
/// rendezvous file.
#[instrument(skip(cgroup, network, request), fields(job_id = %request.job_id))]
pub async fn launch(
    cgroup: &mut CgroupController,
    network: &NetworkOrchestrator,
    request: LaunchRequest,
) -> Result<LaunchOutcome, LaunchError> {
    let job_id = request.job_id;

    // Phase 1.
    let cgroup_path = cgroup.create(job_id, &request.resources)?;
    let rendezvous = Rendezvous::new(job_id);

    let ready_pipe = new_pipe().map_err(LaunchError::Pipe)?;
    let handoff_pipe = new_pipe().map_err(LaunchError::Pipe)?;
    let middle_pid_pipe = new_pipe().map_err(LaunchError::Pipe)?;
    let stdout_pipe = new_pipe().map_err(LaunchError::Pipe)?;
    let stderr_pipe = new_pipe().map_err(LaunchError::Pipe)?;

    // Phase 2: fork. Everything from here to the final exec runs off the
    // tokio runtime.
    let fork_result = unsafe { fork() }.map_err(LaunchError::Fork)?;
    match fork_result {
        ForkResult::Child => {
            drop(ready_pipe.0);
            drop(handoff_pipe.1);
            drop(middle_pid_pipe.0);
            run_middle(
                unshare_flags(),
                ready_pipe.1,
                handoff_pipe.0,
                middle_pid_pipe.1,
                stdout_pipe,
                stderr_pipe,
            );
            unreachable!("run_middle exits the process");
        }
        ForkResult::Parent { child: middle } => {
            drop(ready_pipe.1);
            drop(handoff_pipe.0);
            drop(middle_pid_pipe.1);
            // Only the grandchild's `dup2`'d copies keep the write ends
            // alive from here; this process reads until it sees EOF.
            drop(stdout_pipe.1);
            drop(stderr_pipe.1);
            let stdout = std::fs::File::from(stdout_pipe.0);
            let stderr = std::fs::File::from(stderr_pipe.0);

            let mut ready_rx = std::fs::File::from(ready_pipe.0);
            let mut middle_pid_rx = std::fs::File::from(middle_pid_pipe.0);

            // Wait for "namespaces unshared" before touching /proc/<pid>/ns/net.
            let mut byte = [0u8; 1];
            ready_rx.read_exact(&mut byte).map_err(LaunchError::Pipe)?;

            if let Err(e) = cgroup.attach(job_id, middle.as_raw() as u32) {
                unwind(&rendezvous, cgroup, job_id);
                return Err(e.into());
            }

            let job_net = match network.setup_job_network(job_id, middle.as_raw() as u32, &request.network_name).await
            {
                Ok(net) => net,
                Err(e) => {
                    unwind(&rendezvous, cgroup, job_id);
                    return Err(LaunchError::Network(e));
                }
            };

            let descriptor = ExecDescriptor {
                job_id,
                command: request.command,
                args: request.args,
                env: env_with_network(request.env, &rendezvous, job_net.ip),
                workdir: request.workdir,
                uid: request.uid,
                gid: request.gid,
                job_root: request.job_root,
                mounts: request.mounts,
                hostname: request.hostname,
                network_ready_file: rendezvous.path().to_path_buf(),
            };

            rendezvous.signal_ready().map_err(LaunchError::Rendezvous)?;

            let descriptor_path = std::env::temp_dir().join(format!("joblet-exec-{job_id}.bin"));
            let mut descriptor_file = std::fs::File::create(&descriptor_path).map_err(LaunchError::Pipe)?;
            descriptor.write_to(&mut descriptor_file)?;
            drop(descriptor_file);

            let mut handoff_file = std::fs::File::from(handoff_pipe.1);
            write_path(&mut handoff_file, &descriptor_path).map_err(LaunchError::Pipe)?;
            drop(handoff_file);

            let mut pid_buf = [0u8; 4];
            middle_pid_rx.read_exact(&mut pid_buf).map_err(LaunchError::Pipe)?;
            let grandchild_pid = u32::from_be_bytes(pid_buf);

            let reaper = tokio::task::spawn_blocking(move || reap(middle));

            info!(pid = grandchild_pid, "job launched");
            Ok(LaunchOutcome { pid: grandchild_pid, cgroup_path, job_net, reaper, stdout, stderr })
        }
    }
}

fn env_with_network(
    mut env: HashMap<String, String>,
    rendezvous: &Rendezvous,
    ip: Option<std::net::Ipv4Addr>,
) -> HashMap<String, String> {
    env.insert("NETWORK_READY_FILE".into(), rendezvous.path().display().to_string());
    if let Some(ip) = ip {
        env.insert("JOB_IP".into(), ip.to_string());
    }
    env
}

fn unwind(rendezvous: &Rendezvous, cgroup: &mut CgroupController, job_id: JobId) {
    rendezvous.cleanup();
    let _ = cgroup.cleanup(job_id);
}

/// Runs in the middle process (post-first-fork). Unshares namespaces, then
/// forks again so the grandchild is born as PID 1 of the new PID namespace
/// (spec.md §4.2 Phase 2/4 — `unshare(CLONE_NEWPID)` only affects processes
/// forked afterward, never the caller itself).
fn run_middle(
    flags: CloneFlags,
    ready_tx: OwnedFd,
    handoff_rx: OwnedFd,
    middle_pid_tx: OwnedFd,
    stdout_pipe: (OwnedFd, OwnedFd),
    stderr_pipe: (OwnedFd, OwnedFd),
) -> ! {
    if let Err(e) = nix::sched::unshare(flags) {
        warn!(error = %e, "unshare failed in middle process");
        std::process::exit(crate::error::EXIT_MOUNT_SETUP_FAILURE);
    }
    {
        let mut ready_tx = std::fs::File::from(ready_tx);
        let _ = ready_tx.write_all(&[0u8]);
    }
    // The middle process itself never reads or writes job output; only the
    // top-level parent (read ends) and the grandchild (write ends) should
    // hold a copy, or the parent never sees EOF once the grandchild exits.
    drop(stdout_pipe.0);
    drop(stderr_pipe.0);

    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            drop(middle_pid_tx);
            let _ = nix::unistd::dup2(stdout_pipe.1.as_raw_fd(), 1);
            let _ = nix::unistd::dup2(stderr_pipe.1.as_raw_fd(), 2);
            drop(stdout_pipe.1);
            drop(stderr_pipe.1);
            // The path to the staged descriptor file arrives over the
            // handoff pipe; the descriptor itself is read back only after
            // re-exec, by a fresh process image (spec.md §4.2).
            let mut handoff_file = std::fs::File::from(handoff_rx);
            let descriptor_path = match read_path(&mut handoff_file) {
                Ok(p) => p,
                Err(_) => std::process::exit(crate::error::EXIT_EXEC_FAILURE),
            };
            drop(handoff_file);
            std::process::exit(exec_self_into_init(&descriptor_path));
        }
        Ok(ForkResult::Parent { child: grandchild }) => {
            drop(handoff_rx);
            drop(stdout_pipe.1);
            drop(stderr_pipe.1);
            {
                let mut middle_pid_tx = std::fs::File::from(middle_pid_tx);
                let _ = middle_pid_tx.write_all(&(grandchild.as_raw() as u32).to_be_bytes());
            }
            let status = waitpid(grandchild, None);
            std::process::exit(exit_code_of(status));
        }
        Err(_) => std::process::exit(crate::error::EXIT_MOUNT_SETUP_FAILURE),
    }
}

fn exit_code_of(status: Result<WaitStatus, nix::Error>) -> i32 {
    match status {
        Ok(WaitStatus::Exited(_, code)) => code,
        Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
        _ => crate::error::EXIT_EXEC_FAILURE,
    }
}

/// Awaits the middle process's exit (which forwards the grandchild's exit
/// status) — the "reaper" whose observation of the last PID's exit drives
/// cleanup (spec.md §5).
fn reap(middle: Pid) -> ReapedExit {
    let status = waitpid(middle, None);
    ReapedExit { exit_code: exit_code_of(status) }
}

fn new_pipe() -> std::io::Result<(OwnedFd, OwnedFd)> {
    pipe().map_err(|e| std::io::Error::from_raw_os_error(e as i32))
}

fn write_path(w: &mut impl std::io::Write, path: &std::path::Path) -> std::io::Result<()> {
    let bytes = path.as_os_str().as_encoded_bytes();
    w.write_all(&(bytes.len() as u32).to_be_bytes())?;
    w.write_all(bytes)
}

fn read_path(r: &mut impl std::io::Read) -> std::io::Result<PathBuf> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(PathBuf::from(unsafe { std::ffi::OsString::from_encoded_bytes_unchecked(buf) }))
}

/// Re-execs the current binary with [`crate::init::INIT_MARKER`] so phase 4
/// runs in a fresh process image instead of continuing a forked copy of the
/// daemon's multi-threaded tokio runtime (spec.md §4.2). Only returns on
/// failure — a successful `execve` never returns.
fn exec_self_into_init(descriptor_path: &std::path::Path) -> i32 {
    let exe = match std::env::current_exe() {
        Ok(p) => p,
        Err(_) => return crate::error::EXIT_EXEC_FAILURE,
    };
    let to_cstring = |p: &std::path::Path| {
        std::ffi::CString::new(p.as_os_str().as_encoded_bytes()).map_err(|_| crate::error::EXIT_EXEC_FAILURE)
    };
    let (exe_c, marker_c, path_c) = match (
        to_cstring(&exe),
        std::ffi::CString::new(crate::init::INIT_MARKER),
        to_cstring(descriptor_path),
    ) {
        (Ok(e), Ok(m), Ok(p)) => (e, m, p),
        _ => return crate::error::EXIT_EXEC_FAILURE,
    };
    let argv = [exe_c.as_c_str(), marker_c.as_c_str(), path_c.as_c_str()];
    match nix::unistd::execv(&exe_c, &argv) {
        Ok(never) => match never {},
        Err(_) => crate::error::EXIT_EXEC_FAILURE,
    }
}
