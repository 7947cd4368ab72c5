//! spec.md §8 scenario 5: `--network=isolated` has no route to another job's
//! bridge IP.

use crate::prelude::*;

#[test]
fn isolated_network_job_cannot_reach_a_bridge_job() {
    let daemon = Daemon::start();

    let target_id = daemon.run_job(&["--network", "bridge", "sleep", "5"]);
    let target_ip = wait_for_allocated_ip(&daemon, &target_id);

    let pinger_id =
        daemon.run_job(&["--network", "isolated", "ping", "-c", "1", "-W", "2", &target_ip]);
    let status = daemon.wait_for_job_terminal(&pinger_id);

    assert_eq!(status["status"], "failed");
    assert_ne!(status["exit_code"], 0);

    let logs = daemon.cli().args(&["job", "logs", &pinger_id]).passes().stdout();
    assert!(
        logs.to_lowercase().contains("unreachable") || logs.to_lowercase().contains("100% packet loss"),
        "expected an unreachable/timeout message in ping output, got:\n{logs}"
    );

    daemon.cli().args(&["job", "stop", &target_id]).passes();
}

fn wait_for_allocated_ip(daemon: &Daemon, id: &str) -> String {
    let mut ip = None;
    let found = wait_for(SPEC_WAIT_MAX_MS, || {
        let stdout = daemon.cli().args(&["job", "status", id, "--format", "json"]).passes().stdout();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&stdout) {
            if let Some(addr) = value["allocated_ip"].as_str() {
                ip = Some(addr.to_string());
                return true;
            }
        }
        false
    });
    assert!(found, "job {id} never reported an allocated_ip");
    ip.unwrap()
}
