//! spec.md §8 scenario 1: a trivial job runs to completion and its cgroup is
//! reclaimed.

use crate::prelude::*;

#[test]
fn echo_job_completes_with_expected_output_and_cleans_up_its_cgroup() {
    let daemon = Daemon::start();

    let id = daemon.run_job(&["echo", "hello"]);
    let status = daemon.wait_for_job_terminal(&id);

    assert_eq!(status["status"], "completed");
    assert_eq!(status["exit_code"], 0);

    let logs = daemon.cli().args(&["job", "logs", &id]).passes().stdout();
    assert_eq!(logs, "hello\n");

    let cgroup_path = daemon.root().join("cgroup/joblet.slice").join(format!("job-{id}"));
    let gone = wait_for(SPEC_WAIT_MAX_MS, || !cgroup_path.exists());
    assert!(gone, "job cgroup should be removed after cleanup, still at {}", cgroup_path.display());
}

#[test]
fn stopping_a_completed_job_is_a_noop() {
    let daemon = Daemon::start();

    let id = daemon.run_job(&["true"]);
    daemon.wait_for_job_terminal(&id);

    // spec.md §8 idempotence law: stop(uuid) is idempotent on terminal jobs.
    daemon.cli().args(&["job", "stop", &id]).passes();
    daemon.cli().args(&["job", "stop", &id]).passes();
}
