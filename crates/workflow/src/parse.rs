// SPDX-License-Identifier: MIT

//! YAML workflow definition parsing (spec.md §4.8, §6 `RunWorkflow(yaml+uploads)`).
//! The teacher's HCL-based runbook format (`oj-runbook`) is replaced by YAML
//! per spec.md §6's wire-level format; the job-graph-plus-dependency-edges
//! shape it builds is unchanged.

use crate::error::WorkflowError;
use indexmap::IndexMap;
use joblet_core::workflow::{DependencyEdge, Workflow, WorkflowId, WorkflowJobDef};
use joblet_core::{ExpectedStatus, JobSpec};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct YamlDependency {
    job: String,
    #[serde(default = "default_expect")]
    expect: ExpectedStatus,
}

fn default_expect() -> ExpectedStatus {
    ExpectedStatus::Completed
}

#[derive(Debug, Deserialize)]
struct YamlJob {
    #[serde(flatten)]
    spec: JobSpec,
    #[serde(default)]
    depends_on: Vec<YamlDependency>,
}

#[derive(Debug, Deserialize)]
struct YamlWorkflow {
    jobs: IndexMap<String, YamlJob>,
}

/// Parses workflow YAML into a `Workflow`, failing submit on an undefined
/// dependency or a cycle (spec.md §4.8: "fail submit on cycle").
pub fn parse(yaml: &str) -> Result<Workflow, WorkflowError> {
    let parsed: YamlWorkflow = serde_yaml::from_str(yaml)?;

    let mut jobs = Vec::with_capacity(parsed.jobs.len());
    let mut edges = Vec::new();
    for (name, job) in &parsed.jobs {
        jobs.push(WorkflowJobDef { name: name.clone(), spec: job.spec.clone() });
        for dep in &job.depends_on {
            if !parsed.jobs.contains_key(&dep.job) {
                return Err(WorkflowError::UnknownDependency(dep.job.clone()));
            }
            edges.push(DependencyEdge { from: dep.job.clone(), to: name.clone(), expected: dep.expect });
        }
    }

    let workflow = Workflow {
        id: WorkflowId::new(),
        jobs,
        edges,
        source_yaml: yaml.to_string(),
        submitted: HashMap::new(),
    };
    workflow.topo_order()?;
    Ok(workflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_two_job_chain_with_a_dependency() {
        let yaml = r#"
jobs:
  build:
    command: make
    args: ["build"]
  test:
    command: make
    args: ["test"]
    depends_on:
      - job: build
        expect: completed
"#;
        let workflow = parse(yaml).unwrap();
        assert_eq!(workflow.jobs.len(), 2);
        assert_eq!(workflow.edges.len(), 1);
        assert_eq!(workflow.edges[0].from, "build");
        assert_eq!(workflow.edges[0].to, "test");
    }

    #[test]
    fn default_dependency_expectation_is_completed() {
        let yaml = r#"
jobs:
  build: { command: make }
  test:
    command: make
    depends_on: [{ job: build }]
"#;
        let workflow = parse(yaml).unwrap();
        assert_eq!(workflow.edges[0].expected, ExpectedStatus::Completed);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let yaml = r#"
jobs:
  test:
    command: make
    depends_on: [{ job: ghost }]
"#;
        assert!(matches!(parse(yaml), Err(WorkflowError::UnknownDependency(name)) if name == "ghost"));
    }

    #[test]
    fn a_cycle_is_rejected() {
        let yaml = r#"
jobs:
  a:
    command: make
    depends_on: [{ job: b }]
  b:
    command: make
    depends_on: [{ job: a }]
"#;
        assert!(matches!(parse(yaml), Err(WorkflowError::Graph(_))));
    }

    #[test]
    fn source_yaml_is_retained_verbatim() {
        let yaml = "jobs:\n  build:\n    command: make\n";
        let workflow = parse(yaml).unwrap();
        assert_eq!(workflow.source_yaml, yaml);
    }
}
