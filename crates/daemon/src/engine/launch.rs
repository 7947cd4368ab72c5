// SPDX-License-Identifier: MIT

//! Builds a [`LaunchRequest`] from a job's spec and hands it to the
//! Isolation Launcher, wiring the result's stdout/stderr pipes and reaper
//! into feedback [`Message`]s the engine's own loop consumes (spec.md §4.2).

use crate::engine::Message;
use joblet_cgroup::CgroupController;
use joblet_core::{Job, JobId, VolumeDef};
use joblet_isolation::launcher::{launch, LaunchRequest};
use joblet_isolation::mount_plan::MountPlanBuilder;
use joblet_net::NetworkOrchestrator;
use joblet_runtime::RuntimeResolver;
use joblet_wire::status::Stream;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::warn;

/// Unprivileged uid/gid every job runs as inside its namespace. Joblet does
/// not (yet) support per-job identity mapping; see DESIGN.md.
const JOB_UID: u32 = 65534;
const JOB_GID: u32 = 65534;

/// Stages the job's host-visible workspace: its new-root directory (with a
/// `work/` subdirectory the descriptor's `workdir` resolves to post-pivot)
/// and the private `/tmp` the production mount plan expects to find already
/// present.
fn stage_workspace(job_id: JobId, jobs_root: &Path, job: &Job) -> std::io::Result<(PathBuf, PathBuf)> {
    let job_root = jobs_root.join(job_id.to_string()).join("root");
    let workdir = job_root.join("work");
    std::fs::create_dir_all(&workdir)?;
    for upload in &job.spec.uploads {
        let target = workdir.join(&upload.relative_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &upload.bytes)?;
    }
    let tmp_dir = PathBuf::from(format!("/tmp/job-{job_id}"));
    std::fs::create_dir_all(&tmp_dir)?;
    Ok((job_root, tmp_dir))
}

pub fn cleanup_workspace(job_id: JobId, jobs_root: &Path) {
    let job_root = jobs_root.join(job_id.to_string());
    if let Err(e) = std::fs::remove_dir_all(&job_root) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(%job_id, error = %e, "failed to remove job workspace");
        }
    }
    let tmp_dir = PathBuf::from(format!("/tmp/job-{job_id}"));
    let _ = std::fs::remove_dir_all(tmp_dir);
}

pub enum LaunchOutcome {
    Succeeded { pid: u32, cgroup_path: PathBuf, job_net: joblet_net::JobNetwork },
    Failed { reason: String },
}

/// Resolves the job's runtime/volumes into a mount plan, runs the two-phase
/// launch protocol, and spawns the stdout/stderr + reaper feedback tasks.
/// Runs on the engine's own task (it needs `&mut CgroupController`, which
/// the engine owns exclusively) — callers must not invoke this
/// concurrently with another launch.
pub async fn run(
    job: &Job,
    jobs_root: &Path,
    runtime_resolver: &RuntimeResolver,
    volumes: &HashMap<String, VolumeDef>,
    cgroup: &mut CgroupController,
    network: &NetworkOrchestrator,
    engine_tx: mpsc::Sender<Message>,
) -> LaunchOutcome {
    let job_id = job.id;

    let (job_root, _tmp_dir) = match stage_workspace(job_id, jobs_root, job) {
        Ok(paths) => paths,
        Err(e) => return LaunchOutcome::Failed { reason: format!("workspace staging failed: {e}") },
    };

    let resolved_runtime = match &job.spec.runtime {
        Some(runtime_ref) => match runtime_resolver.resolve(runtime_ref) {
            Ok(resolved) => Some(resolved),
            Err(e) => return LaunchOutcome::Failed { reason: format!("runtime resolution failed: {e}") },
        },
        None => None,
    };

    let job_volumes: Vec<(String, PathBuf)> = job
        .spec
        .volumes
        .iter()
        .filter_map(|name| volumes.get(name).map(|def| (name.clone(), def.backing_path.clone())))
        .collect();

    let mounts = match MountPlanBuilder::production(
        job_id,
        resolved_runtime.as_ref().map(|r| r.isolated_root.as_path()),
        resolved_runtime.as_ref().map(|r| r.mount_targets.as_slice()).unwrap_or(&[]),
        &job_volumes,
    ) {
        Ok(builder) => builder.build(),
        Err(e) => return LaunchOutcome::Failed { reason: format!("mount plan rejected: {e}") },
    };

    let mut env: HashMap<String, String> = job.spec.env.clone().into_iter().collect();
    if let Some(resolved) = &resolved_runtime {
        for (k, v) in &resolved.manifest.env {
            env.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    let request = LaunchRequest {
        job_id,
        network_name: job.spec.network.clone(),
        resources: job.spec.resources.clone(),
        command: job.spec.command.clone(),
        args: job.spec.args.clone(),
        env,
        workdir: PathBuf::from("/work"),
        uid: JOB_UID,
        gid: JOB_GID,
        hostname: format!("job-{job_id}"),
        job_root,
        mounts,
    };

    match launch(cgroup, network, request).await {
        Ok(outcome) => {
            spawn_log_reader(job_id, Stream::Stdout, outcome.stdout, engine_tx.clone());
            spawn_log_reader(job_id, Stream::Stderr, outcome.stderr, engine_tx.clone());
            spawn_reaper_feedback(job_id, outcome.reaper, engine_tx);
            LaunchOutcome::Succeeded { pid: outcome.pid, cgroup_path: outcome.cgroup_path, job_net: outcome.job_net }
        }
        Err(e) => LaunchOutcome::Failed { reason: e.to_string() },
    }
}

/// Reads raw bytes off a job's stdout/stderr pipe on a blocking thread (the
/// read end is a plain blocking `File`) and forwards them to the engine,
/// which owns the job's `LogHub` (spec.md §4.5).
fn spawn_log_reader(job_id: JobId, stream: Stream, mut file: std::fs::File, engine_tx: mpsc::Sender<Message>) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 16 * 1024];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if engine_tx.blocking_send(Message::LogData { job_id, stream, data: buf[..n].to_vec() }).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = engine_tx.blocking_send(Message::LogEof { job_id, stream });
    });
}

fn spawn_reaper_feedback(
    job_id: JobId,
    reaper: tokio::task::JoinHandle<joblet_isolation::launcher::ReapedExit>,
    engine_tx: mpsc::Sender<Message>,
) {
    tokio::spawn(async move {
        let exit_code = match reaper.await {
            Ok(reaped) => reaped.exit_code,
            Err(_) => -1,
        };
        let _ = engine_tx.send(Message::ProcessExited { job_id, exit_code }).await;
    });
}
