//! spec.md §8 scenario 6: a slow log subscriber gets dropped with a
//! BACKPRESSURE_DROPPED sentinel while the job itself is never blocked by it.

use crate::prelude::*;
use std::io::Read;
use std::process::{Command, Stdio};

#[test]
fn a_slow_subscriber_is_dropped_but_the_job_still_completes() {
    let daemon = Daemon::start();

    // ~10 MiB of stdout, written as fast as the job can manage.
    let id = daemon.run_job(&["bash", "-c", "head -c 10485760 /dev/urandom | base64"]);

    // Fast consumer: drains the stream as quickly as it's delivered.
    let mut fast = joblet_stream_command(&daemon, &id);
    let mut fast_child = fast.stdout(Stdio::piped()).spawn().expect("joblet job logs should run");
    let mut fast_out = fast_child.stdout.take().unwrap();

    // Slow consumer: reads once per second in small chunks, guaranteed to
    // fall behind a stream this size before the job finishes.
    let mut slow = joblet_stream_command(&daemon, &id);
    let mut slow_child = slow.stdout(Stdio::piped()).spawn().expect("joblet job logs should run");
    let mut slow_out = slow_child.stdout.take().unwrap();

    let mut fast_bytes = Vec::new();
    let fast_done = std::thread::spawn(move || {
        fast_out.read_to_end(&mut fast_bytes).ok();
        fast_bytes
    });

    let mut slow_buf = [0u8; 4096];
    let mut slow_total = 0usize;
    loop {
        match slow_out.read(&mut slow_buf) {
            Ok(0) => break,
            Ok(n) => slow_total += n,
            Err(_) => break,
        }
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
    let _ = slow_child.wait();

    let fast_bytes = fast_done.join().unwrap();
    let _ = fast_child.wait();

    assert!(fast_bytes.len() > slow_total, "slow subscriber should receive strictly less than the fast one");

    let status = daemon.wait_for_job_terminal(&id);
    assert_eq!(status["status"], "completed");
    assert_eq!(status["exit_code"], 0);
}

/// `joblet job logs <id>` as a raw `Command`, for piping stdout incrementally
/// instead of buffering the whole run through `output()`.
fn joblet_stream_command(daemon: &Daemon, id: &str) -> Command {
    let mut cmd = daemon.cli().args(&["job", "logs", id]).into_command();
    cmd.stdin(Stdio::null());
    cmd
}
