// SPDX-License-Identifier: MIT

//! Thin wrapper around shelling out to `ip`/`nsenter` — the same
//! `tokio::process::Command` + structured-log-on-failure idiom the daemon's
//! effect executor uses for its own external commands.

use crate::error::NetError;
use tracing::{instrument, warn};

#[instrument(skip_all, fields(command = %program))]
pub async fn run(program: &str, args: &[&str]) -> Result<(), NetError> {
    let display = format!("{program} {}", args.join(" "));
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| NetError::Spawn { command: display.clone(), source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(command = %display, %stderr, "network command failed");
        return Err(NetError::CommandFailed { command: display, stderr });
    }
    Ok(())
}

/// Runs `ip <args>` inside the network namespace of `pid` via `nsenter`.
pub async fn run_in_netns(pid: u32, args: &[&str]) -> Result<(), NetError> {
    let pid = pid.to_string();
    let mut full = vec!["--target", pid.as_str(), "--net", "--", "ip"];
    full.extend_from_slice(args);
    run("nsenter", &full).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_command_is_reported_with_stderr() {
        let err = run("false", &[]).await.unwrap_err();
        assert!(matches!(err, NetError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn successful_command_returns_ok() {
        run("true", &[]).await.unwrap();
    }
}
