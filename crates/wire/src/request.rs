// SPDX-License-Identifier: MIT

//! Client → daemon request types (spec.md §6 "Wire protocol (to clients)").

use joblet_core::{JobId, JobSpec, JobStatus, NetworkDef, RuntimeRef, UploadEntry, VolumeDef, WorkflowId};
use serde::{Deserialize, Serialize};

/// Filter for `ListJobs` (spec.md §4.1: "filters by status, workflow id, name").
/// `workflow_job_name` filters on the job's name-within-workflow, not a
/// standalone job name field — jobs have no name outside a workflow context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default)]
    pub workflow_job_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Hello { client_version: String },

    RunJob { spec: JobSpec },
    StopJob { id: JobId },
    GetJobStatus { id: JobId },
    ListJobs { filter: JobFilter },
    StreamJobLogs { id: JobId },
    StreamJobMetrics { id: JobId },

    RunWorkflow { yaml: String, #[serde(default)] uploads: Vec<UploadEntry> },
    GetWorkflowStatus { id: WorkflowId, #[serde(default)] detail: bool },

    CreateNetwork { def: NetworkDef },
    ListNetworks,
    DeleteNetwork { name: String },

    CreateVolume { def: VolumeDef },
    ListVolumes,
    DeleteVolume { name: String },

    ListRuntimes,
    RegisterRuntime { def: RuntimeRef },

    GetNodeInfo,
}

impl Request {
    /// True if this request yields zero-or-more streamed responses followed
    /// by a `Response::Done` frame, rather than exactly one response.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Request::StreamJobLogs { .. } | Request::StreamJobMetrics { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_requests_are_identified() {
        assert!(Request::StreamJobLogs { id: JobId::new() }.is_streaming());
        assert!(!Request::GetJobStatus { id: JobId::new() }.is_streaming());
    }

    #[test]
    fn job_filter_round_trips_through_json() {
        let filter = JobFilter {
            status: Some(JobStatus::Running),
            workflow_id: Some(WorkflowId::new()),
            workflow_job_name: Some("build".into()),
        };
        let json = serde_json::to_string(&filter).unwrap();
        let back: JobFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(filter, back);
    }
}
