//! spec.md §8 scenario 3: A -> B(requires A=completed) -> C(requires
//! B=completed), where B fails, so C never runs.

use crate::prelude::*;

const WORKFLOW_YAML: &str = r#"
jobs:
  a:
    command: "true"
  b:
    command: bash
    args: ["-c", "exit 1"]
    depends_on:
      - job: a
        expect: completed
  c:
    command: echo
    args: ["done"]
    depends_on:
      - job: b
        expect: completed
"#;

#[test]
fn a_failed_dependency_fails_its_dependent_without_ever_running_it() {
    let daemon = Daemon::start();

    let file = daemon.root().join("workflow.yaml");
    std::fs::write(&file, WORKFLOW_YAML).unwrap();

    let stdout = daemon.cli().args(&["workflow", "run", file.to_str().unwrap()]).passes().stdout();
    let workflow_id = stdout.strip_prefix("workflow accepted: ").unwrap().trim().to_string();

    let status = wait_for_workflow_settled(&daemon, &workflow_id);

    let slot = |name: &str| status["jobs"].as_array().unwrap().iter().find(|s| s["name"] == name).unwrap().clone();

    assert_eq!(slot("a")["status"]["status"], "completed");

    let b = slot("b");
    assert_eq!(b["status"]["status"], "failed");
    assert_eq!(b["status"]["exit_code"], 1);

    // spec.md §8 scenario 3: C is terminal-FAILED with the scheduler's
    // synthetic reason, stamped on a job that never actually ran.
    let c = slot("c");
    assert_eq!(c["status"]["status"], "failed");
    assert_eq!(c["status"]["failure_reason"], "dependency-not-satisfied");
    // -1 is the decision layer's sentinel for "never actually forked" (core::decision).
    assert_eq!(c["status"]["exit_code"], -1);
}

fn wait_for_workflow_settled(daemon: &Daemon, workflow_id: &str) -> serde_json::Value {
    let mut last = serde_json::Value::Null;
    let done = wait_for(SPEC_WAIT_MAX_MS * 2, || {
        let stdout = daemon.cli().args(&["workflow", "status", workflow_id, "--format", "json"]).passes().stdout();
        match serde_json::from_str::<serde_json::Value>(&stdout) {
            Ok(value) => {
                let settled = value["jobs"].as_array().map(|jobs| {
                    jobs.iter().all(|slot| {
                        matches!(slot["status"]["status"].as_str(), Some("completed") | Some("failed") | Some("stopped"))
                    })
                });
                last = value;
                settled.unwrap_or(false)
            }
            Err(_) => false,
        }
    });
    assert!(done, "workflow {workflow_id} did not settle in time");
    last
}
