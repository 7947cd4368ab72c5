// SPDX-License-Identifier: MIT

//! Events that drive job state transitions. The Lifecycle Manager applies
//! one `Event` at a time to the job table (single-writer, spec.md §9); each
//! application is pure (see [`crate::decision`]) and yields the set of
//! [`crate::effect::Effect`]s the runtime must then carry out.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A scheduled job's start time arrived; route it to the isolation launcher.
    ScheduledStartFired { job_id: JobId },
    /// IL reports the child is exec'd and running.
    LaunchSucceeded { job_id: JobId, pid: u32 },
    /// IL reports setup failed before/during fork (phases 1-3) or the child
    /// aborted with a well-known exit code (phase 4).
    LaunchFailed { job_id: JobId, reason: String, exit_code: Option<i32> },
    /// The process reaper observed the job's PID-1 exit.
    ProcessExited { job_id: JobId, exit_code: i32 },
    /// `stop(uuid)` was called.
    StopRequested { job_id: JobId },
    /// The stop grace period elapsed without the process exiting.
    StopGraceExpired { job_id: JobId },
    /// A workflow predecessor reached a terminal state; re-evaluate this
    /// job's dependency expectations.
    DependencyUnsatisfiable { job_id: JobId, reason: String },
}

impl Event {
    pub fn job_id(&self) -> JobId {
        match self {
            Event::ScheduledStartFired { job_id }
            | Event::LaunchSucceeded { job_id, .. }
            | Event::LaunchFailed { job_id, .. }
            | Event::ProcessExited { job_id, .. }
            | Event::StopRequested { job_id }
            | Event::StopGraceExpired { job_id }
            | Event::DependencyUnsatisfiable { job_id, .. } => *job_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::ScheduledStartFired { .. } => "scheduled_start_fired",
            Event::LaunchSucceeded { .. } => "launch_succeeded",
            Event::LaunchFailed { .. } => "launch_failed",
            Event::ProcessExited { .. } => "process_exited",
            Event::StopRequested { .. } => "stop_requested",
            Event::StopGraceExpired { .. } => "stop_grace_expired",
            Event::DependencyUnsatisfiable { .. } => "dependency_unsatisfiable",
        }
    }
}
