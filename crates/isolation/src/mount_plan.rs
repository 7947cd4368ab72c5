// SPDX-License-Identifier: MIT

//! Mount plan construction (spec.md §4.2 Phase 4 step 3, §4.6). The plan is
//! built in the parent (where path validation can still report a clean
//! `FAILED` job) and carried to the child inside the [`crate::descriptor::ExecDescriptor`].

use crate::error::LaunchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host directories bind-mounted read-only into every production job's
/// root (spec.md §4.2 Phase 4 step 3).
pub const PRODUCTION_BASE_DIRS: &[&str] = &["/bin", "/usr/bin", "/lib", "/usr/lib", "/lib64", "/usr/lib64"];

/// Root of the runtime registry; only `runtimes/` may be bind-mounted
/// read-write for builder jobs — every other subtree is a recursion hazard
/// (spec.md §4.2 Phase 4 step 3, §4.6).
pub const JOBLET_ROOT: &str = "/opt/joblet";
pub const RUNTIMES_SUBTREE: &str = "runtimes";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountEntry {
    pub source: PathBuf,
    /// Relative to the job's new root.
    pub target: PathBuf,
    pub read_only: bool,
    pub recursive: bool,
}

#[derive(Debug, Default)]
pub struct MountPlanBuilder {
    entries: Vec<MountEntry>,
}

impl MountPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, source: impl Into<PathBuf>, target: impl Into<PathBuf>, read_only: bool, recursive: bool) {
        self.entries.push(MountEntry { source: source.into(), target: target.into(), read_only, recursive });
    }

    /// Production job plan: curated host dirs, the runtime's `isolated/`
    /// subtree, volumes, and a private `/tmp`.
    pub fn production(
        job_id: joblet_core::JobId,
        runtime_isolated_root: Option<&Path>,
        runtime_targets: &[(PathBuf, PathBuf)],
        volumes: &[(String, PathBuf)],
    ) -> Result<Self, LaunchError> {
        let mut plan = Self::new();
        for dir in PRODUCTION_BASE_DIRS {
            plan.push(*dir, *dir, true, true);
        }
        if let Some(isolated_root) = runtime_isolated_root {
            for (target, rel) in runtime_targets {
                let source = isolated_root.join(rel);
                reject_if_outside_opt_joblet_jobs(&source)?;
                plan.push(source, target.clone(), true, true);
            }
        }
        for (name, host_path) in volumes {
            plan.push(host_path.clone(), PathBuf::from("volumes").join(name), false, true);
        }
        plan.push(format!("/tmp/job-{job_id}"), "tmp", false, false);
        Ok(plan)
    }

    /// Builder ("runtime-build") job plan: the full host root read-only,
    /// except `/opt/joblet/` which is excluded entirely and re-mounted with
    /// only `runtimes/` writable (spec.md §4.2 Phase 4 step 3, §4.6).
    pub fn builder() -> Self {
        let mut plan = Self::new();
        plan.push("/", "/", true, true);
        plan.push(format!("{JOBLET_ROOT}/{RUNTIMES_SUBTREE}"), format!("{JOBLET_ROOT}/{RUNTIMES_SUBTREE}"), false, true);
        plan
    }

    pub fn build(self) -> Vec<MountEntry> {
        self.entries
    }
}

/// The non-negotiable recursion guard (spec.md §4.2 Phase 4 step 3): "any
/// mount whose source resolves inside `/opt/joblet/jobs/` or any other
/// `/opt/joblet/` subtree other than `runtimes/` must be rejected."
pub fn reject_if_outside_opt_joblet_jobs(source: &Path) -> Result<(), LaunchError> {
    let joblet_root = Path::new(JOBLET_ROOT);
    let runtimes = joblet_root.join(RUNTIMES_SUBTREE);
    if source.starts_with(joblet_root) && !source.starts_with(&runtimes) {
        return Err(LaunchError::MountEscapesSubtree { source_path: source.to_path_buf() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_plan_includes_base_dirs_and_private_tmp() {
        let job_id = joblet_core::JobId::new();
        let plan = MountPlanBuilder::production(job_id, None, &[], &[]).unwrap().build();
        assert!(plan.iter().any(|e| e.source == Path::new("/bin") && e.read_only));
        assert!(plan.iter().any(|e| e.target == Path::new("tmp") && !e.read_only));
    }

    #[test]
    fn production_plan_mounts_volumes_under_volumes_name() {
        let job_id = joblet_core::JobId::new();
        let volumes = vec![("data".to_string(), PathBuf::from("/var/lib/joblet/volumes/data"))];
        let plan = MountPlanBuilder::production(job_id, None, &[], &volumes).unwrap().build();
        assert!(plan.iter().any(|e| e.target == Path::new("volumes/data") && !e.read_only));
    }

    #[test]
    fn runtime_target_inside_jobs_subtree_is_rejected() {
        let job_id = joblet_core::JobId::new();
        let isolated_root = Path::new("/opt/joblet/jobs/other-job/isolated");
        let targets = vec![(PathBuf::from("/runtime"), PathBuf::from("."))];
        let err = MountPlanBuilder::production(job_id, Some(isolated_root), &targets, &[]).unwrap_err();
        assert!(matches!(err, LaunchError::MountEscapesSubtree { .. }));
    }

    #[test]
    fn builder_plan_exposes_only_runtimes_subtree_writable() {
        let plan = MountPlanBuilder::builder().build();
        assert!(plan.iter().any(|e| e.source == Path::new("/") && e.read_only));
        assert!(plan.iter().any(|e| e.target == Path::new("/opt/joblet/runtimes") && !e.read_only));
    }

    #[test]
    fn runtimes_subtree_itself_is_never_rejected() {
        reject_if_outside_opt_joblet_jobs(Path::new("/opt/joblet/runtimes/python/3.12")).unwrap();
    }

    #[test]
    fn jobs_subtree_is_rejected() {
        let err = reject_if_outside_opt_joblet_jobs(Path::new("/opt/joblet/jobs/abc/isolated")).unwrap_err();
        assert!(matches!(err, LaunchError::MountEscapesSubtree { .. }));
    }
}
