// SPDX-License-Identifier: MIT

//! The Cgroup Controller (CC, spec.md §4.3): owns the per-job cgroup v2
//! subtree exclusively — no other component writes it (spec.md §3
//! Ownership).

use crate::devices::discover_block_devices;
use crate::error::CgroupError;
use crate::paths::{job_cgroup_dir, slice_root};
use crate::stats::{Sample, Sampler};
use crate::writer;
use joblet_core::{JobId, ResourceRequest};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub struct CgroupController {
    cgroup_root: PathBuf,
    sampler: Sampler,
}

impl CgroupController {
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self { cgroup_root: cgroup_root.into(), sampler: Sampler::new() }
    }

    pub fn with_default_root() -> Self {
        Self::new(crate::paths::DEFAULT_CGROUP_ROOT)
    }

    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        job_cgroup_dir(&self.cgroup_root, job_id)
    }

    /// Create the job's cgroup directory and write its resource quotas
    /// (spec.md §4.2 Phase 1 step 1). Idempotent: creating an already-present
    /// directory is not an error, matching the slice-creation pattern below.
    #[instrument(skip(self, resources), fields(job_id = %job_id))]
    pub fn create(&self, job_id: JobId, resources: &ResourceRequest) -> Result<PathBuf, CgroupError> {
        let slice = slice_root(&self.cgroup_root);
        if !slice.exists() {
            std::fs::create_dir_all(&slice)
                .map_err(|source| CgroupError::CreateDir { path: slice.clone(), source })?;
            // Best-effort: enabling controllers can fail in test fixtures
            // (plain directories, not a real cgroupfs) or on a read-only
            // cgroup.subtree_control; the per-job writes below are what
            // actually matters for the job's quotas.
            let _ = writer::enable_controllers(&slice);
        }

        let job_dir = self.job_dir(job_id);
        std::fs::create_dir_all(&job_dir)
            .map_err(|source| CgroupError::CreateDir { path: job_dir.clone(), source })?;

        let block_devices = discover_block_devices(Path::new("/sys/block")).unwrap_or_default();
        writer::apply_resources(&job_dir, resources, &block_devices)?;
        debug!(path = %job_dir.display(), "cgroup created and quotas applied");
        Ok(job_dir)
    }

    /// Write `pid` into the job's `cgroup.procs` (spec.md §4.2 Phase 3 step 1:
    /// "before the child does anything that consumes resources").
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn attach(&self, job_id: JobId, pid: u32) -> Result<(), CgroupError> {
        writer::attach_pid(&self.job_dir(job_id), pid)
    }

    /// Read one stats sample (spec.md §4.3 `sample(uuid)`).
    pub fn sample(&mut self, job_id: JobId) -> Result<Sample, CgroupError> {
        self.sampler.sample(job_id, &self.job_dir(job_id))
    }

    /// Remove the job's cgroup directory. Idempotent: a missing directory is
    /// not an error (spec.md §5 "Cleanup ... is idempotent").
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn cleanup(&mut self, job_id: JobId) -> Result<(), CgroupError> {
        self.sampler.forget(job_id);
        let job_dir = self.job_dir(job_id);
        match std::fs::remove_dir(&job_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CgroupError::RemoveDir { path: job_dir, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::ResourceRequest;
    use tempfile::tempdir;

    fn seed_control_files(job_dir: &Path) {
        for name in [
            "cpu.max",
            "cpuset.cpus",
            "memory.max",
            "pids.max",
            "cgroup.procs",
            "cpu.stat",
            "memory.current",
            "memory.stat",
            "memory.events",
            "pids.current",
        ] {
            std::fs::write(job_dir.join(name), "0\n").unwrap();
        }
    }

    #[test]
    fn create_then_attach_then_cleanup_round_trips() {
        let root = tempdir().unwrap();
        let controller = CgroupController::new(root.path());
        let job_id = JobId::new();
        let job_dir = controller.job_dir(job_id);
        std::fs::create_dir_all(&job_dir).unwrap();
        seed_control_files(&job_dir);

        controller.create(job_id, &ResourceRequest::default()).unwrap();
        controller.attach(job_id, 4242).unwrap();
        assert_eq!(std::fs::read_to_string(job_dir.join("cgroup.procs")).unwrap(), "4242");

        let mut controller = controller;
        controller.cleanup(job_id).unwrap();
        assert!(!job_dir.exists());
    }

    #[test]
    fn cleanup_on_missing_directory_is_not_an_error() {
        let root = tempdir().unwrap();
        let mut controller = CgroupController::new(root.path());
        controller.cleanup(JobId::new()).unwrap();
    }
}
