// SPDX-License-Identifier: MIT

//! Effects represent side effects the runtime must perform after a decision
//! function updates the job table. Grounded in the teacher's Effect/Event
//! split: decisions stay pure and testable without touching namespaces,
//! cgroups, or sockets; the daemon's executor drains the effect list.
//!
//! Effects are an in-process work queue (never serialized over the wire or
//! to disk — only [`crate::event::Event`]s are persisted), so this type
//! derives only what in-process plumbing needs.

use crate::job::JobId;
use crate::timer::{TimerId, TimerKind};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Effect {
    /// Hand the job to the Isolation Launcher (phases 1-4, spec.md §4.2).
    Launch { job_id: JobId },
    /// Send a signal to the job's PID-1 (spec.md §5 Cancellation).
    SendSignal { job_id: JobId, signal: i32 },
    /// Release cgroup/netns/IP/mounts/workspace (spec.md §5, idempotent).
    Cleanup { job_id: JobId },
    SetTimer { id: TimerId, duration: Duration },
    CancelTimer { id: TimerId },
    /// Mirror the current job record to the State Persister (spec.md §4.7).
    PersistJob { job_id: JobId },
    DeletePersistedJob { job_id: JobId },
    /// Re-evaluate a workflow's ready-set after one of its jobs went terminal
    /// (spec.md §4.8).
    ReevaluateWorkflow { job_id: JobId },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Launch { .. } => "launch",
            Effect::SendSignal { .. } => "send_signal",
            Effect::Cleanup { .. } => "cleanup",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
            Effect::PersistJob { .. } => "persist_job",
            Effect::DeletePersistedJob { .. } => "delete_persisted_job",
            Effect::ReevaluateWorkflow { .. } => "reevaluate_workflow",
        }
    }

    pub fn set_timer(job_id: JobId, kind: TimerKind, duration: Duration) -> Effect {
        Effect::SetTimer { id: TimerId { job_id, kind }, duration }
    }

    pub fn cancel_timer(job_id: JobId, kind: TimerKind) -> Effect {
        Effect::CancelTimer { id: TimerId { job_id, kind } }
    }
}
