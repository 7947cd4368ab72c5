// SPDX-License-Identifier: MIT

//! Cgroup v2 path layout (spec.md §6 "Cgroup layout",
//! `/sys/fs/cgroup/joblet.slice/<service>.slice/job-<uuid>/`).

use joblet_core::JobId;
use std::path::{Path, PathBuf};

pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";
pub const SLICE_NAME: &str = "joblet.slice";

/// Root of the joblet slice under a given cgroup v2 mount point.
pub fn slice_root(cgroup_root: &Path) -> PathBuf {
    cgroup_root.join(SLICE_NAME)
}

/// Per-job cgroup directory: `<root>/joblet.slice/job-<uuid>/`.
pub fn job_cgroup_dir(cgroup_root: &Path, job_id: JobId) -> PathBuf {
    slice_root(cgroup_root).join(format!("job-{job_id}"))
}

pub fn control_file(job_dir: &Path, name: &str) -> PathBuf {
    job_dir.join(name)
}
