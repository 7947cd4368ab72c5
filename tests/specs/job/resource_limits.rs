//! spec.md §8 scenario 2: a job that forks children and exits non-zero under
//! a memory cap.

use crate::prelude::*;

#[test]
fn capped_job_reports_its_own_exit_code_not_the_cgroup_oom_kill() {
    let daemon = Daemon::start();

    let id = daemon.run_job(&[
        "--memory-mb",
        "64",
        "bash",
        "-c",
        "yes > /dev/null & sleep 1; exit 3",
    ]);
    let status = daemon.wait_for_job_terminal(&id);

    assert_eq!(status["status"], "failed");
    assert_eq!(status["exit_code"], 3);
}

#[test]
fn zero_cpu_percent_and_memory_mb_mean_unlimited() {
    let daemon = Daemon::start();

    // spec.md §8 boundary behaviors: cpu_percent = 0 / memory_mb = 0 mean no
    // quota, not "run nothing".
    let id = daemon.run_job(&["--cpu-percent", "0", "--memory-mb", "0", "true"]);
    let status = daemon.wait_for_job_terminal(&id);

    assert_eq!(status["status"], "completed");
    assert_eq!(status["exit_code"], 0);
}
