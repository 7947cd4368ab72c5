// SPDX-License-Identifier: MIT

//! `JobRecord`: the subset of `Job` mirrored to the state persister
//! (spec.md §4.7). Durable enough to reconstruct the Lifecycle Manager's
//! table on restart without carrying anything the external process has no
//! business seeing (no env vars, no secrets).

use joblet_core::{Job, JobId, JobStatus, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub node_id: NodeId,
    pub status: JobStatus,
    pub command: String,
    pub args: Vec<String>,
    pub pid: u32,
    pub exit_code: Option<i32>,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub failure_reason: Option<String>,
    /// Unix epoch milliseconds this record was last upserted; `list_since`
    /// filters on this field.
    pub updated_at_ms: u64,
}

impl JobRecord {
    pub fn from_job(job: &Job, updated_at_ms: u64) -> Self {
        Self {
            id: job.id,
            node_id: job.node_id,
            status: job.status,
            command: job.spec.command.clone(),
            args: job.spec.args.clone(),
            pid: job.pid,
            exit_code: job.exit_code,
            started_at_ms: job.started_at_ms,
            ended_at_ms: job.ended_at_ms,
            failure_reason: job.failure_reason.clone(),
            updated_at_ms,
        }
    }

    /// spec.md §4.7: jobs that had not reached a terminal state before the
    /// previous shutdown are marked FAILED with this reason, since their
    /// processes are definitively gone after a node restart.
    pub const NODE_RESTART_REASON: &'static str = "node-restart";

    pub fn mark_failed_on_restart(&mut self, now_ms: u64) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Failed;
            self.failure_reason = Some(Self::NODE_RESTART_REASON.to_string());
            self.ended_at_ms = Some(now_ms);
            self.updated_at_ms = now_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::{JobSpec, ResourceRequest};
    use std::collections::{BTreeMap, BTreeSet};

    fn job() -> Job {
        let spec = JobSpec {
            command: "echo".into(),
            args: vec!["hi".into()],
            env: BTreeMap::new(),
            resources: ResourceRequest::default(),
            runtime: None,
            network: "bridge".into(),
            volumes: BTreeSet::new(),
            uploads: Vec::new(),
            scheduled_start_ms: None,
            workflow: None,
        };
        Job::new(JobId::new(), NodeId::new(), spec)
    }

    #[test]
    fn non_terminal_jobs_are_marked_failed_with_node_restart_reason() {
        let job = job();
        let mut record = JobRecord::from_job(&job, 1000);
        record.mark_failed_on_restart(2000);
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.failure_reason.as_deref(), Some("node-restart"));
        assert_eq!(record.ended_at_ms, Some(2000));
    }

    #[test]
    fn terminal_jobs_are_left_untouched_on_restart() {
        let job = job();
        let mut record = JobRecord::from_job(&job, 1000);
        record.status = JobStatus::Completed;
        record.exit_code = Some(0);
        let before = record.clone();
        record.mark_failed_on_restart(2000);
        assert_eq!(record, before);
    }
}
