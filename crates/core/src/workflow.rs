// SPDX-License-Identifier: MIT

//! Workflow DAG: named job specs plus dependency edges with expected
//! predecessor status (spec.md §3, §4.8).

use crate::job::{JobId, JobStatus, JobSpec};
use crate::uuid_id;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

uuid_id! {
    /// Unique identifier for a workflow run.
    pub struct WorkflowId;
}

/// spec.md §3/§4.8: the condition a dependency edge expects of its
/// predecessor's terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedStatus {
    Completed,
    Failed,
    Finished,
}

impl ExpectedStatus {
    /// spec.md §4.8: COMPLETED iff exit 0, FAILED iff non-zero/FAILED state,
    /// FINISHED by any terminal state.
    pub fn is_satisfied_by(self, status: JobStatus, exit_code: Option<i32>) -> bool {
        match self {
            ExpectedStatus::Completed => status == JobStatus::Completed && exit_code == Some(0),
            ExpectedStatus::Failed => {
                status == JobStatus::Failed || (status.is_terminal() && exit_code != Some(0))
            }
            ExpectedStatus::Finished => status.is_terminal(),
        }
    }

    /// Whether a terminal status makes this expectation permanently
    /// unsatisfiable (spec.md §4.8: "immediately terminal-FAILED").
    pub fn is_unsatisfiable_by(self, status: JobStatus, exit_code: Option<i32>) -> bool {
        status.is_terminal() && !self.is_satisfied_by(status, exit_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub expected: ExpectedStatus,
}

/// A named job spec within a workflow, prior to being submitted to LM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJobDef {
    pub name: String,
    pub spec: JobSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub jobs: Vec<WorkflowJobDef>,
    pub edges: Vec<DependencyEdge>,
    /// Verbatim original YAML text, retained for later inspection (spec.md §3).
    pub source_yaml: String,
    /// name -> submitted JobId, populated as jobs are released to LM.
    pub submitted: HashMap<String, JobId>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowGraphError {
    #[error("dependency edge references undefined job name {0:?}")]
    UndefinedJob(String),
    #[error("workflow dependency graph contains a cycle")]
    Cycle,
}

impl Workflow {
    /// spec.md §3 invariant + §4.8: "topologically orders for cycle
    /// detection (fail submit on cycle)". Returns a valid topological order
    /// of job names, or an error.
    pub fn topo_order(&self) -> Result<Vec<String>, WorkflowGraphError> {
        let names: HashSet<&str> = self.jobs.iter().map(|j| j.name.as_str()).collect();
        for e in &self.edges {
            if !names.contains(e.from.as_str()) {
                return Err(WorkflowGraphError::UndefinedJob(e.from.clone()));
            }
            if !names.contains(e.to.as_str()) {
                return Err(WorkflowGraphError::UndefinedJob(e.to.clone()));
            }
        }

        let mut indegree: HashMap<&str, usize> =
            self.jobs.iter().map(|j| (j.name.as_str(), 0)).collect();
        let mut adj: HashMap<&str, Vec<&str>> =
            self.jobs.iter().map(|j| (j.name.as_str(), Vec::new())).collect();
        for e in &self.edges {
            adj.get_mut(e.from.as_str()).unwrap().push(e.to.as_str());
            *indegree.get_mut(e.to.as_str()).unwrap() += 1;
        }

        let mut queue: VecDeque<&str> =
            indegree.iter().filter(|(_, &d)| d == 0).map(|(&n, _)| n).collect();
        let mut order = Vec::with_capacity(self.jobs.len());
        while let Some(n) = queue.pop_front() {
            order.push(n.to_string());
            for &next in &adj[n] {
                let d = indegree.get_mut(next).unwrap();
                *d -= 1;
                if *d == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != self.jobs.len() {
            return Err(WorkflowGraphError::Cycle);
        }
        Ok(order)
    }

    /// Dependency edges whose `to` is `job_name`.
    pub fn dependencies_of<'a>(&'a self, job_name: &str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.to == job_name)
    }

    pub fn dependents_of<'a>(&'a self, job_name: &str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.from == job_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn job_def(name: &str) -> WorkflowJobDef {
        WorkflowJobDef {
            name: name.into(),
            spec: JobSpec {
                command: "true".into(),
                args: vec![],
                env: BTreeMap::new(),
                resources: Default::default(),
                runtime: None,
                network: "bridge".into(),
                volumes: Default::default(),
                uploads: vec![],
                scheduled_start_ms: None,
                workflow: None,
            },
        }
    }

    fn workflow(edges: Vec<DependencyEdge>) -> Workflow {
        Workflow {
            id: WorkflowId::new(),
            jobs: vec![job_def("a"), job_def("b"), job_def("c")],
            edges,
            source_yaml: String::new(),
            submitted: HashMap::new(),
        }
    }

    #[test]
    fn acyclic_chain_topo_sorts() {
        let wf = workflow(vec![
            DependencyEdge { from: "a".into(), to: "b".into(), expected: ExpectedStatus::Completed },
            DependencyEdge { from: "b".into(), to: "c".into(), expected: ExpectedStatus::Completed },
        ]);
        let order = wf.topo_order().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let wf = workflow(vec![
            DependencyEdge { from: "a".into(), to: "b".into(), expected: ExpectedStatus::Completed },
            DependencyEdge { from: "b".into(), to: "c".into(), expected: ExpectedStatus::Completed },
            DependencyEdge { from: "c".into(), to: "a".into(), expected: ExpectedStatus::Completed },
        ]);
        assert_eq!(wf.topo_order(), Err(WorkflowGraphError::Cycle));
    }

    #[test]
    fn undefined_dependency_is_rejected() {
        let wf = workflow(vec![DependencyEdge {
            from: "a".into(),
            to: "ghost".into(),
            expected: ExpectedStatus::Completed,
        }]);
        assert_eq!(wf.topo_order(), Err(WorkflowGraphError::UndefinedJob("ghost".into())));
    }

    #[test]
    fn completed_expectation_requires_exit_zero() {
        assert!(ExpectedStatus::Completed.is_satisfied_by(JobStatus::Completed, Some(0)));
        assert!(!ExpectedStatus::Completed.is_satisfied_by(JobStatus::Completed, Some(1)));
        assert!(ExpectedStatus::Completed.is_unsatisfiable_by(JobStatus::Failed, Some(1)));
    }

    #[test]
    fn finished_expectation_satisfied_by_any_terminal_state() {
        assert!(ExpectedStatus::Finished.is_satisfied_by(JobStatus::Failed, Some(1)));
        assert!(ExpectedStatus::Finished.is_satisfied_by(JobStatus::Completed, Some(0)));
        assert!(!ExpectedStatus::Finished.is_satisfied_by(JobStatus::Running, None));
    }
}
