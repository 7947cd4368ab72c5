// SPDX-License-Identifier: MIT

//! Pure state-transition logic: given a [`Job`] and an [`Event`], compute the
//! next state and the [`Effect`]s that follow. No I/O, no namespaces, no
//! clocks beyond an injected `now_ms` — this is the part of the Lifecycle
//! Manager that's cheap to test exhaustively (spec.md §8 Testable
//! Properties).

use crate::effect::Effect;
use crate::event::Event;
use crate::job::{Job, JobStatus};
use crate::timer::TimerKind;
use std::time::Duration;

/// Default grace period between SIGTERM and SIGKILL (spec.md §5).
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);

/// Apply `event` to `job`, mutating its status/fields in place and
/// returning the effects the runtime must now perform.
///
/// Panics only on a misrouted event (an event whose `job_id` doesn't match
/// `job.id`) — that's a bug in the caller, not a reachable runtime state.
pub fn apply(job: &mut Job, event: Event, now_ms: u64) -> Vec<Effect> {
    assert_eq!(event.job_id(), job.id, "event routed to the wrong job");

    match event {
        Event::ScheduledStartFired { job_id } => {
            if job.status != JobStatus::Scheduled {
                return vec![]; // already started/stopped; stale timer fire.
            }
            job.status = JobStatus::Initializing;
            vec![Effect::Launch { job_id }, Effect::PersistJob { job_id }]
        }

        Event::LaunchSucceeded { job_id, pid } => {
            if job.status.is_terminal() {
                // stop() raced with a launch that was already in flight; the
                // caller (executor) is responsible for killing `pid` — we
                // just don't resurrect a terminal job.
                return vec![Effect::SendSignal { job_id, signal: libc_sigkill() }];
            }
            job.status = JobStatus::Running;
            job.pid = pid;
            job.started_at_ms = Some(now_ms);
            vec![Effect::PersistJob { job_id }]
        }

        Event::LaunchFailed { job_id, reason, exit_code } => {
            job.status = JobStatus::Failed;
            job.exit_code = exit_code.or(Some(-1));
            job.ended_at_ms = Some(now_ms);
            job.failure_reason = Some(reason);
            vec![
                Effect::Cleanup { job_id },
                Effect::PersistJob { job_id },
                Effect::ReevaluateWorkflow { job_id },
            ]
        }

        Event::ProcessExited { job_id, exit_code } => {
            if job.status.is_terminal() {
                return vec![];
            }
            job.status = if exit_code == 0 { JobStatus::Completed } else { JobStatus::Failed };
            job.exit_code = Some(exit_code);
            job.ended_at_ms = Some(now_ms);
            vec![
                Effect::cancel_timer(job_id, TimerKind::StopGrace),
                Effect::Cleanup { job_id },
                Effect::PersistJob { job_id },
                Effect::ReevaluateWorkflow { job_id },
            ]
        }

        Event::StopRequested { job_id } => {
            if job.status.is_terminal() {
                return vec![]; // idempotent on terminal jobs (spec.md §4.1).
            }
            if job.status == JobStatus::Scheduled {
                // Not yet started: stop immediately, remove from timer wheel.
                job.status = JobStatus::Stopped;
                job.ended_at_ms = Some(now_ms);
                return vec![
                    Effect::cancel_timer(job_id, TimerKind::ScheduledStart),
                    Effect::PersistJob { job_id },
                    Effect::ReevaluateWorkflow { job_id },
                ];
            }
            if job.pid == 0 {
                // Initializing, pre-fork: let the in-flight launch's failure
                // path land on Stopped rather than Failed (spec.md §7: "Stop
                // races... if the child has not yet execed, setup aborts and
                // the job is STOPPED").
                job.status = JobStatus::Stopped;
                job.ended_at_ms = Some(now_ms);
                return vec![
                    Effect::Cleanup { job_id },
                    Effect::PersistJob { job_id },
                    Effect::ReevaluateWorkflow { job_id },
                ];
            }
            vec![
                Effect::SendSignal { job_id, signal: libc_sigterm() },
                Effect::set_timer(job_id, TimerKind::StopGrace, DEFAULT_STOP_GRACE),
            ]
        }

        Event::StopGraceExpired { job_id } => {
            if job.status.is_terminal() {
                return vec![];
            }
            vec![Effect::SendSignal { job_id, signal: libc_sigkill() }]
        }

        Event::DependencyUnsatisfiable { job_id, reason } => {
            if job.status.is_terminal() {
                return vec![];
            }
            job.status = JobStatus::Failed;
            job.exit_code = Some(-1);
            job.ended_at_ms = Some(now_ms);
            job.failure_reason = Some(reason);
            vec![
                Effect::Cleanup { job_id },
                Effect::PersistJob { job_id },
                Effect::ReevaluateWorkflow { job_id },
            ]
        }
    }
}

/// `stop(uuid)` marks the job STOPPED once the reaper confirms exit; this is
/// called from the reaper path (process exited while a stop was pending)
/// rather than from `apply` directly, since the caller already knows the
/// process is gone.
pub fn apply_stopped_exit(job: &mut Job, exit_code: i32, now_ms: u64) -> Vec<Effect> {
    if job.status.is_terminal() {
        return vec![];
    }
    job.status = JobStatus::Stopped;
    job.exit_code = Some(exit_code);
    job.ended_at_ms = Some(now_ms);
    let job_id = job.id;
    vec![
        Effect::cancel_timer(job_id, TimerKind::StopGrace),
        Effect::Cleanup { job_id },
        Effect::PersistJob { job_id },
        Effect::ReevaluateWorkflow { job_id },
    ]
}

fn libc_sigterm() -> i32 {
    15
}

fn libc_sigkill() -> i32 {
    9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobId, JobSpec, NodeId, ResourceRequest};
    use std::collections::BTreeMap;

    fn new_job(scheduled: bool) -> Job {
        let spec = JobSpec {
            command: "echo".into(),
            args: vec![],
            env: BTreeMap::new(),
            resources: ResourceRequest::default(),
            runtime: None,
            network: "bridge".into(),
            volumes: Default::default(),
            uploads: vec![],
            scheduled_start_ms: if scheduled { Some(1) } else { None },
            workflow: None,
        };
        Job::new(JobId::new(), NodeId::new(), spec)
    }

    #[test]
    fn scheduled_start_transitions_to_initializing_and_launches() {
        let mut job = new_job(true);
        let id = job.id;
        let effects = apply(&mut job, Event::ScheduledStartFired { job_id: id }, 100);
        assert_eq!(job.status, JobStatus::Initializing);
        assert!(matches!(effects[0], Effect::Launch { .. }));
    }

    #[test]
    fn launch_succeeded_sets_pid_and_running() {
        let mut job = new_job(false);
        let id = job.id;
        apply(&mut job, Event::LaunchSucceeded { job_id: id, pid: 4242 }, 200);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.pid, 4242);
        assert_eq!(job.started_at_ms, Some(200));
    }

    #[test]
    fn process_exit_zero_completes_nonzero_fails() {
        let mut ok = new_job(false);
        let ok_id = ok.id;
        apply(&mut ok, Event::LaunchSucceeded { job_id: ok_id, pid: 1 }, 0);
        apply(&mut ok, Event::ProcessExited { job_id: ok_id, exit_code: 0 }, 10);
        assert_eq!(ok.status, JobStatus::Completed);

        let mut bad = new_job(false);
        let bad_id = bad.id;
        apply(&mut bad, Event::LaunchSucceeded { job_id: bad_id, pid: 1 }, 0);
        apply(&mut bad, Event::ProcessExited { job_id: bad_id, exit_code: 3 }, 10);
        assert_eq!(bad.status, JobStatus::Failed);
        assert_eq!(bad.exit_code, Some(3));
    }

    #[test]
    fn stop_on_scheduled_job_is_immediate() {
        let mut job = new_job(true);
        let id = job.id;
        let effects = apply(&mut job, Event::StopRequested { job_id: id }, 5);
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(effects.iter().any(|e| matches!(e, Effect::CancelTimer { .. })));
    }

    #[test]
    fn stop_on_running_job_sends_sigterm_and_arms_grace_timer() {
        let mut job = new_job(false);
        let id = job.id;
        apply(&mut job, Event::LaunchSucceeded { job_id: id, pid: 99 }, 0);
        let effects = apply(&mut job, Event::StopRequested { job_id: id }, 1);
        assert!(matches!(effects[0], Effect::SendSignal { signal: 15, .. }));
        assert!(matches!(effects[1], Effect::SetTimer { .. }));
        assert_eq!(job.status, JobStatus::Running); // transitions to Stopped only once reaped
    }

    #[test]
    fn stop_is_idempotent_on_terminal_jobs() {
        let mut job = new_job(false);
        let id = job.id;
        apply(&mut job, Event::LaunchSucceeded { job_id: id, pid: 1 }, 0);
        apply(&mut job, Event::ProcessExited { job_id: id, exit_code: 0 }, 1);
        let effects = apply(&mut job, Event::StopRequested { job_id: id }, 2);
        assert!(effects.is_empty());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn setup_failure_before_fork_is_failed_with_sentinel_exit_code() {
        let mut job = new_job(false);
        let id = job.id;
        apply(
            &mut job,
            Event::LaunchFailed { job_id: id, reason: "cgroup create failed".into(), exit_code: None },
            3,
        );
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.exit_code, Some(-1));
    }

    #[test]
    fn dependency_unsatisfiable_fails_with_reason() {
        let mut job = new_job(false);
        let id = job.id;
        apply(
            &mut job,
            Event::DependencyUnsatisfiable { job_id: id, reason: "dependency-not-satisfied".into() },
            4,
        );
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("dependency-not-satisfied"));
    }
}
