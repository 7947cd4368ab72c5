//! spec.md §8 scenario 4: two jobs on the default `bridge` network can reach
//! each other by allocated IP.

use crate::prelude::*;

#[test]
fn a_listener_and_a_connector_on_bridge_network_exchange_bytes() {
    let daemon = Daemon::start();

    let listener_id =
        daemon.run_job(&["--network", "bridge", "nc", "-l", "-p", "9000"]);

    let listener_ip = wait_for_allocated_ip(&daemon, &listener_id);

    let connector_id = daemon.run_job(&[
        "--network",
        "bridge",
        "--scheduled-start-ms",
        &future_epoch_ms(200).to_string(),
        "nc",
        &listener_ip,
        "9000",
    ]);

    daemon.wait_for_job_terminal(&listener_id);
    daemon.wait_for_job_terminal(&connector_id);
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

fn future_epoch_ms(delay_ms: u64) -> u64 {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap();
    now.as_millis() as u64 + delay_ms
}
