// SPDX-License-Identifier: MIT

//! Job identity and the observable job state machine.
//!
//! spec.md §3: `INITIALIZING → RUNNING → {COMPLETED | FAILED | STOPPED}`
//! plus `SCHEDULED → INITIALIZING` and `INITIALIZING → FAILED` (setup
//! failure before fork). Terminal states are absorbing.

use crate::env::is_secret_env_name;
use crate::runtime_ref::RuntimeRef;
use crate::uuid_id;
use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

uuid_id! {
    /// Globally-unique (within the node) job identifier. spec.md §3: "Uniquely
    /// identified by a v4 UUID."
    pub struct JobId;
}

uuid_id! {
    /// Process-wide node identity, stamped on every job record and log line
    /// for multi-node attribution (spec.md §9 "Global mutable state").
    pub struct NodeId;
}

/// Observable job status. spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Initializing,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    /// Terminal states are absorbing: no further transitions are legal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped)
    }
}

crate::simple_display! {
    JobStatus {
        Scheduled => "scheduled",
        Initializing => "initializing",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Stopped => "stopped",
    }
}

/// Per-job cpu/memory/io/pids/cpuset/gpu resource request. spec.md §3, §4.3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// 0 means unlimited (spec.md §8 boundary behavior).
    #[serde(default)]
    pub cpu_percent: u32,
    /// 0 means unlimited.
    #[serde(default)]
    pub memory_mb: u64,
    /// 0 means unlimited. Governs block I/O via `io.max`, not network (spec.md §9).
    #[serde(default)]
    pub io_bps: u64,
    /// `cpuset.cpus` literal list/range, e.g. `"0-3,5"`. Empty means unconstrained.
    #[serde(default)]
    pub cpu_cores: String,
    /// `pids.max`; 0 selects the default of 1024.
    #[serde(default)]
    pub pids_max: u32,
    #[serde(default)]
    pub gpu_count: u32,
    #[serde(default)]
    pub gpu_memory_mb: u64,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            cpu_percent: 0,
            memory_mb: 0,
            io_bps: 0,
            cpu_cores: String::new(),
            pids_max: 0,
            gpu_count: 0,
            gpu_memory_mb: 0,
        }
    }
}

impl ResourceRequest {
    /// `pids.max` value to actually write: the configured value, or the
    /// default of 1024 (spec.md §4.3 table).
    pub fn pids_max_effective(&self) -> u32 {
        if self.pids_max == 0 {
            1024
        } else {
            self.pids_max
        }
    }
}

/// A file staged into the job workspace before exec (upload manifest entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEntry {
    /// Path relative to the job's `/work` directory.
    pub relative_path: PathBuf,
    pub bytes: Vec<u8>,
}

/// A submitted job's full specification, as accepted by `LM::submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: ResourceRequest,
    #[serde(default)]
    pub runtime: Option<RuntimeRef>,
    /// Defaults to `"bridge"` (spec.md §3).
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub volumes: BTreeSet<String>,
    #[serde(default)]
    pub uploads: Vec<UploadEntry>,
    /// Unix epoch milliseconds. In the past or absent means "start now"
    /// (spec.md §8 boundary behavior).
    #[serde(default)]
    pub scheduled_start_ms: Option<u64>,
    #[serde(default)]
    pub workflow: Option<(WorkflowId, String)>,
}

fn default_network() -> String {
    "bridge".to_string()
}

/// A job's full mutable record as owned exclusively by the Lifecycle Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub node_id: NodeId,
    pub spec: JobSpec,
    pub status: JobStatus,
    /// 0 until exec (spec.md §3 invariant).
    pub pid: u32,
    pub cgroup_path: Option<PathBuf>,
    pub allocated_ip: Option<std::net::IpAddr>,
    pub exit_code: Option<i32>,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    /// Set when setup/isolation fails before or during fork (spec.md §4.2).
    pub failure_reason: Option<String>,
}

impl Job {
    pub fn new(id: JobId, node_id: NodeId, spec: JobSpec) -> Self {
        let status =
            if spec.scheduled_start_ms.is_some() { JobStatus::Scheduled } else { JobStatus::Initializing };
        Self {
            id,
            node_id,
            spec,
            status,
            pid: 0,
            cgroup_path: None,
            allocated_ip: None,
            exit_code: None,
            started_at_ms: None,
            ended_at_ms: None,
            failure_reason: None,
        }
    }

    /// Invariant: RUNNING implies a live PID (spec.md §3/§8). Checked at the
    /// boundary where the state transitions, not re-verified on every read.
    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running && self.pid != 0
    }

    /// Masked environment view for status projections (spec.md §3 invariant:
    /// "Secret environment values never appear in status projections").
    pub fn masked_env(&self) -> BTreeMap<String, String> {
        self.spec
            .env
            .iter()
            .map(|(k, v)| {
                if is_secret_env_name(k) {
                    (k.clone(), crate::env::MASK.to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec {
            command: "echo".into(),
            args: vec!["hello".into()],
            env: BTreeMap::new(),
            resources: ResourceRequest::default(),
            runtime: None,
            network: "bridge".into(),
            volumes: BTreeSet::new(),
            uploads: vec![],
            scheduled_start_ms: None,
            workflow: None,
        }
    }

    #[test]
    fn new_job_without_schedule_starts_initializing() {
        let job = Job::new(JobId::new(), NodeId::new(), spec());
        assert_eq!(job.status, JobStatus::Initializing);
    }

    #[test]
    fn new_job_with_schedule_starts_scheduled() {
        let mut s = spec();
        s.scheduled_start_ms = Some(9_999_999_999_999);
        let job = Job::new(JobId::new(), NodeId::new(), s);
        assert_eq!(job.status, JobStatus::Scheduled);
    }

    #[test]
    fn masked_env_hides_secret_values_only() {
        let mut s = spec();
        s.env.insert("SECRET_FOO".into(), "hunter2".into());
        s.env.insert("API_TOKEN".into(), "abc123".into());
        s.env.insert("PATH".into(), "/usr/bin".into());
        let job = Job::new(JobId::new(), NodeId::new(), s);
        let masked = job.masked_env();
        assert_eq!(masked["SECRET_FOO"], "***");
        assert_eq!(masked["API_TOKEN"], "***");
        assert_eq!(masked["PATH"], "/usr/bin");
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for s in [JobStatus::Completed, JobStatus::Failed, JobStatus::Stopped] {
            assert!(s.is_terminal());
        }
        for s in [JobStatus::Scheduled, JobStatus::Initializing, JobStatus::Running] {
            assert!(!s.is_terminal());
        }
    }

    #[test]
    fn pids_max_effective_defaults_to_1024() {
        let r = ResourceRequest::default();
        assert_eq!(r.pids_max_effective(), 1024);
        let r2 = ResourceRequest { pids_max: 50, ..ResourceRequest::default() };
        assert_eq!(r2.pids_max_effective(), 50);
    }
}
