// SPDX-License-Identifier: MIT

//! Snapshot projection types returned to clients. `JobStatusView` is the one
//! place secret env values get masked (spec.md §3.2 / invariant: "Secret
//! environment values never appear in status projections").

use joblet_core::{
    Job, JobId, JobStatus, NetworkDef, NodeId, ResourceRequest, RuntimeRef, VolumeDef, WorkflowId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusView {
    pub id: JobId,
    pub node_id: NodeId,
    pub status: JobStatus,
    pub command: String,
    pub args: Vec<String>,
    /// Secret values replaced with `"***"` — see `Job::masked_env`.
    pub env: BTreeMap<String, String>,
    pub resources: ResourceRequest,
    pub runtime: Option<RuntimeRef>,
    pub network: String,
    pub volumes: Vec<String>,
    pub pid: u32,
    pub allocated_ip: Option<IpAddr>,
    pub exit_code: Option<i32>,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub failure_reason: Option<String>,
    pub workflow: Option<(WorkflowId, String)>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        JobStatusView {
            id: job.id,
            node_id: job.node_id,
            status: job.status,
            command: job.spec.command.clone(),
            args: job.spec.args.clone(),
            env: job.masked_env(),
            resources: job.spec.resources.clone(),
            runtime: job.spec.runtime.clone(),
            network: job.spec.network.clone(),
            volumes: job.spec.volumes.iter().cloned().collect(),
            pid: job.pid,
            allocated_ip: job.allocated_ip,
            exit_code: job.exit_code,
            started_at_ms: job.started_at_ms,
            ended_at_ms: job.ended_at_ms,
            failure_reason: job.failure_reason.clone(),
            workflow: job.spec.workflow.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowJobSlot {
    pub name: String,
    pub job_id: Option<JobId>,
    pub status: Option<JobStatusView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStatusView {
    pub id: WorkflowId,
    pub jobs: Vec<WorkflowJobSlot>,
    /// Present only when the request asked for `detail = true` (spec.md §6).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_yaml: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One unit of a `StreamJobLogs` response (spec.md §4.5 write path / §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogChunk {
    pub job_id: JobId,
    pub stream: Stream,
    pub seq: u64,
    pub ts_rfc3339: String,
    pub bytes: Vec<u8>,
}

/// Sentinel emitted instead of a `LogChunk`/`MetricSample` when a subscriber
/// falls behind and LP drops it (spec.md §4.5 "BACKPRESSURE_DROPPED").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackpressureDropped {
    pub job_id: JobId,
    pub stream: Stream,
    /// Number of chunks dropped before the subscriber was evicted.
    pub dropped_count: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuSample {
    pub usage_percent: f64,
    pub throttled_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemorySample {
    pub current: u64,
    pub peak: u64,
    pub anon: u64,
    pub file: u64,
    pub oom_events: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IoSample {
    pub rbytes: u64,
    pub wbytes: u64,
    pub rios: u64,
    pub wios: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PidsSample {
    pub current: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PressureSample {
    pub cpu_avg10: f64,
    pub memory_avg10: f64,
    pub io_avg10: f64,
}

/// One cgroup stats sample (spec.md §4.3 `sample(uuid)`), pushed to clients
/// subscribed via `StreamJobMetrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub job_id: JobId,
    pub ts_rfc3339: String,
    pub cpu: CpuSample,
    pub memory: MemorySample,
    pub io: IoSample,
    pub pids: PidsSample,
    pub pressure: PressureSample,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkView {
    pub def: NetworkDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeView {
    pub def: VolumeDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeView {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub uptime_secs: u64,
    pub active_job_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::{JobSpec, NodeId, ResourceRequest};
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn job_status_view_masks_secrets() {
        let mut spec = JobSpec {
            command: "echo".into(),
            args: vec![],
            env: BTreeMap::new(),
            resources: ResourceRequest::default(),
            runtime: None,
            network: "bridge".into(),
            volumes: BTreeSet::new(),
            uploads: vec![],
            scheduled_start_ms: None,
            workflow: None,
        };
        spec.env.insert("DB_PASSWORD".into(), "hunter2".into());
        let job = Job::new(JobId::new(), NodeId::new(), spec);
        let view = JobStatusView::from(&job);
        assert_eq!(view.env["DB_PASSWORD"], "***");
    }
}
