// SPDX-License-Identifier: MIT

//! Workflow Scheduler (WS, spec.md §4.8): releases jobs whose dependencies'
//! expected statuses are already satisfied, and re-evaluates the ready set
//! on every terminal transition observed from the Lifecycle Manager.

use joblet_core::workflow::{Workflow, WorkflowGraphError};
use joblet_core::JobStatus;
use std::collections::{HashMap, HashSet};

/// Reason stamped on a job that's terminal-FAILED without ever running
/// because a dependency's expectation became unsatisfiable.
pub const DEPENDENCY_NOT_SATISFIED: &str = "dependency-not-satisfied";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScheduleUpdate {
    /// Job names now ready to submit to LM.
    pub newly_ready: Vec<String>,
    /// Job names terminal-FAILED without running, with the failure reason.
    pub newly_failed: Vec<(String, &'static str)>,
}

/// Tracks one workflow run's ready-set evaluation. Does not itself submit
/// jobs or watch LM — the daemon drives `on_terminal` from observed
/// transitions and acts on the returned `ScheduleUpdate`.
pub struct WorkflowScheduler {
    workflow: Workflow,
    order: Vec<String>,
    /// Names already released to LM or synthetic-failed; never reconsidered.
    dispatched: HashSet<String>,
    /// Terminal (status, exit_code) observed for each job name, including
    /// synthetic entries for dependency-failed jobs so their own
    /// dependents evaluate correctly.
    terminal: HashMap<String, (JobStatus, Option<i32>)>,
}

impl WorkflowScheduler {
    pub fn new(workflow: Workflow) -> Result<Self, WorkflowGraphError> {
        let order = workflow.topo_order()?;
        Ok(Self { workflow, order, dispatched: HashSet::new(), terminal: HashMap::new() })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Mutable access so the daemon can stamp `Workflow::submitted` as it
    /// releases each named job to LM.
    pub fn workflow_mut(&mut self) -> &mut Workflow {
        &mut self.workflow
    }

    /// Initial ready set: jobs with no dependencies.
    pub fn initial_ready(&mut self) -> Vec<String> {
        self.evaluate().newly_ready
    }

    /// Call once LM reports `job_name` reached a terminal state.
    pub fn on_terminal(&mut self, job_name: &str, status: JobStatus, exit_code: Option<i32>) -> ScheduleUpdate {
        self.terminal.insert(job_name.to_string(), (status, exit_code));
        self.evaluate()
    }

    fn is_ready(&self, name: &str) -> bool {
        self.workflow.dependencies_of(name).all(|edge| {
            self.terminal
                .get(&edge.from)
                .map(|&(status, exit_code)| edge.expected.is_satisfied_by(status, exit_code))
                .unwrap_or(false)
        })
    }

    fn unsatisfiable_reason(&self, name: &str) -> Option<&'static str> {
        self.workflow
            .dependencies_of(name)
            .any(|edge| {
                self.terminal
                    .get(&edge.from)
                    .is_some_and(|&(status, exit_code)| edge.expected.is_unsatisfiable_by(status, exit_code))
            })
            .then_some(DEPENDENCY_NOT_SATISFIED)
    }

    /// Walks the topological order once so a dependency-failure synthesized
    /// this pass is visible to its own dependents in the same pass.
    fn evaluate(&mut self) -> ScheduleUpdate {
        let mut update = ScheduleUpdate::default();
        for name in self.order.clone() {
            if self.dispatched.contains(&name) {
                continue;
            }
            if let Some(reason) = self.unsatisfiable_reason(&name) {
                self.dispatched.insert(name.clone());
                self.terminal.insert(name.clone(), (JobStatus::Failed, None));
                update.newly_failed.push((name.clone(), reason));
                continue;
            }
            if self.is_ready(&name) {
                self.dispatched.insert(name.clone());
                update.newly_ready.push(name);
            }
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn scheduler(yaml: &str) -> WorkflowScheduler {
        WorkflowScheduler::new(parse(yaml).unwrap()).unwrap()
    }

    #[test]
    fn a_job_with_no_dependencies_is_ready_immediately() {
        let mut s = scheduler("jobs:\n  a:\n    command: true\n");
        assert_eq!(s.initial_ready(), vec!["a".to_string()]);
    }

    #[test]
    fn a_dependent_job_is_released_once_its_predecessor_completes() {
        let mut s = scheduler(
            "jobs:\n  a:\n    command: true\n  b:\n    command: true\n    depends_on: [{ job: a }]\n",
        );
        assert_eq!(s.initial_ready(), vec!["a".to_string()]);
        let update = s.on_terminal("a", JobStatus::Completed, Some(0));
        assert_eq!(update.newly_ready, vec!["b".to_string()]);
        assert!(update.newly_failed.is_empty());
    }

    #[test]
    fn an_unsatisfiable_expectation_fails_the_dependent_without_running_it() {
        let mut s = scheduler(
            "jobs:\n  a:\n    command: true\n  b:\n    command: true\n    depends_on: [{ job: a, expect: completed }]\n",
        );
        s.initial_ready();
        let update = s.on_terminal("a", JobStatus::Failed, Some(1));
        assert_eq!(update.newly_failed, vec![("b".to_string(), DEPENDENCY_NOT_SATISFIED)]);
        assert!(update.newly_ready.is_empty());
    }

    #[test]
    fn a_dependency_failure_cascades_to_transitive_dependents_in_one_pass() {
        let mut s = scheduler(
            "jobs:\n  a:\n    command: true\n  b:\n    command: true\n    depends_on: [{ job: a }]\n  c:\n    command: true\n    depends_on: [{ job: b }]\n",
        );
        s.initial_ready();
        let update = s.on_terminal("a", JobStatus::Failed, Some(1));
        assert_eq!(
            update.newly_failed,
            vec![("b".to_string(), DEPENDENCY_NOT_SATISFIED), ("c".to_string(), DEPENDENCY_NOT_SATISFIED)]
        );
    }

    #[test]
    fn finished_expectation_is_satisfied_regardless_of_exit_code() {
        let mut s = scheduler(
            "jobs:\n  a:\n    command: true\n  b:\n    command: true\n    depends_on: [{ job: a, expect: finished }]\n",
        );
        s.initial_ready();
        let update = s.on_terminal("a", JobStatus::Failed, Some(1));
        assert_eq!(update.newly_ready, vec!["b".to_string()]);
    }
}
