// SPDX-License-Identifier: MIT

//! Phase 4 (spec.md §4.2): runs in the grandchild, which has just become PID
//! 1 of the new PID namespace. Entirely synchronous — this process is a
//! freshly-forked single-threaded image, not the tokio runtime.

use crate::descriptor::ExecDescriptor;
use crate::error::ChildError;
use crate::mount_plan::MountEntry;
use crate::rendezvous::Rendezvous;
use nix::mount::{mount, MsFlags};
use nix::unistd::{self, Gid, Pid, Uid};
use std::ffi::CString;
use std::path::Path;

/// Argv marker `jobletd` re-execs itself with (spec.md §4.2: "`jobletd`
/// re-execs itself with an internal `--init` subcommand/env marker so phase
/// 4 runs as a fresh process image rather than continuing the parent's
/// address space post-fork"). The grandchild of the launch fork never runs
/// this crate's `init::run` directly — it `execve`s back into the daemon
/// binary with this marker, the same way the teacher's `spawn.rs` re-invokes
/// `current_exe()` for a clean child image.
pub const INIT_MARKER: &str = "--joblet-init";

/// Entry point for the re-exec'd process: read the descriptor the launcher
/// staged at `path`, remove it, and run phase 4. Called from `jobletd`'s
/// `main()` when `argv[1] == INIT_MARKER`.
pub fn run_from_path(path: &std::path::Path) -> i32 {
    let descriptor = match std::fs::File::open(path).and_then(|mut f| ExecDescriptor::read_from(&mut f)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("joblet init: failed to read exec descriptor: {e}");
            return crate::error::EXIT_EXEC_FAILURE;
        }
    };
    let _ = std::fs::remove_file(path);
    run(descriptor)
}

/// Runs to completion only on success — on any failure it returns the
/// exit code the parent should observe (spec.md §4.2 "Failure semantics",
/// phase 4 well-known exit codes); on success it `exec`s and never returns.
pub fn run(descriptor: ExecDescriptor) -> i32 {
    match run_inner(&descriptor) {
        Ok(never) => match never {},
        Err(e) => {
            eprintln!("joblet init: {e}");
            e.exit_code()
        }
    }
}

fn run_inner(descriptor: &ExecDescriptor) -> Result<std::convert::Infallible, ChildError> {
    Rendezvous::at(descriptor.network_ready_file.clone()).await_ready()?;

    apply_mounts(&descriptor.job_root, &descriptor.mounts).map_err(|e| ChildError::MountSetup(e.to_string()))?;

    unistd::sethostname(&descriptor.hostname).map_err(|e| ChildError::MountSetup(e.to_string()))?;
    unistd::chdir(&descriptor.workdir).map_err(|e| ChildError::MountSetup(e.to_string()))?;

    unistd::setgid(Gid::from_raw(descriptor.gid)).map_err(|e| ChildError::MountSetup(e.to_string()))?;
    unistd::setuid(Uid::from_raw(descriptor.uid)).map_err(|e| ChildError::MountSetup(e.to_string()))?;

    if unistd::getpid() != Pid::from_raw(1) {
        return Err(ChildError::NamespaceVerification);
    }

    exec(descriptor)
}

/// Assembles the job root at `job_root` by bind-mounting each plan entry
/// underneath it, then `pivot_root`s into it (spec.md §4.2 Phase 4 steps
/// 3-4). Mount propagation is made private first so none of this leaks back
/// to the host's mount namespace.
fn apply_mounts(job_root: &Path, entries: &[MountEntry]) -> Result<(), nix::Error> {
    mount(None::<&str>, "/", None::<&str>, MsFlags::MS_REC | MsFlags::MS_PRIVATE, None::<&str>)?;
    std::fs::create_dir_all(job_root).map_err(|_| nix::Error::EIO)?;
    mount(Some(job_root), job_root, None::<&str>, MsFlags::MS_BIND, None::<&str>)?;

    for entry in entries {
        let target = job_root.join(entry.target.strip_prefix("/").unwrap_or(&entry.target));
        if let Some(parent) = target.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::create_dir_all(&target);
        let mut flags = MsFlags::MS_BIND;
        if entry.recursive {
            flags |= MsFlags::MS_REC;
        }
        mount(Some(&entry.source), &target, None::<&str>, flags, None::<&str>)?;
        if entry.read_only {
            mount(
                None::<&str>,
                &target,
                None::<&str>,
                flags | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
                None::<&str>,
            )?;
        }
    }

    let put_old = job_root.join(".joblet-old-root");
    std::fs::create_dir_all(&put_old).map_err(|_| nix::Error::EIO)?;
    unistd::pivot_root(job_root, &put_old)?;
    unistd::chdir("/")?;
    mount(None::<&str>, "/.joblet-old-root", None::<&str>, MsFlags::MS_REC | MsFlags::MS_PRIVATE, None::<&str>)?;
    nix::mount::umount2("/.joblet-old-root", nix::mount::MntFlags::MNT_DETACH)?;
    let _ = std::fs::remove_dir("/.joblet-old-root");
    Ok(())
}

fn exec(descriptor: &ExecDescriptor) -> Result<std::convert::Infallible, ChildError> {
    let path = CString::new(descriptor.command.as_bytes()).map_err(ChildError::InvalidArgument)?;
    let mut argv = vec![path.clone()];
    for arg in &descriptor.args {
        argv.push(CString::new(arg.as_bytes()).map_err(ChildError::InvalidArgument)?);
    }
    let envp: Vec<CString> = descriptor
        .env
        .iter()
        .map(|(k, v)| CString::new(format!("{k}={v}")).map_err(ChildError::InvalidArgument))
        .collect::<Result<_, _>>()?;

    match unistd::execve(&path, &argv, &envp) {
        Ok(never) => match never {},
        Err(e) => Err(ChildError::Exec(e)),
    }
}
