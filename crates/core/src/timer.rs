// SPDX-License-Identifier: MIT

//! Timer identifiers for the Lifecycle Manager's timer wheel (spec.md §5
//! "Suspension points"): scheduled-start deferrals, stop grace periods, and
//! cgroup-stats sampling ticks.

use crate::id::ShortId;
use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Fires when a `SCHEDULED` job's start time arrives.
    ScheduledStart,
    /// Fires `grace_period` after SIGTERM if the process hasn't exited.
    StopGrace,
    /// Periodic cgroup-stats sampling tick (spec.md §4.3, default 5s).
    StatsSample,
    /// Phase-4 rendezvous-file poll timeout backstop owned by the parent
    /// (the child enforces its own 10s cap independently; this is the
    /// parent-side mirror used to detect a hung child).
    RendezvousTimeout,
}

/// A timer is identified by (job, kind) — at most one of each kind is ever
/// outstanding per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    pub job_id: JobId,
    pub kind: TimerKind,
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.job_id)
    }
}

/// An opaque handle for a live log subscription (spec.md §4.1
/// `subscribe_logs`), used to cancel on client disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub ShortId);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(ShortId::new("sub"))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
