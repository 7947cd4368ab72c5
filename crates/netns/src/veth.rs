// SPDX-License-Identifier: MIT

//! Per-job veth plumbing (spec.md §4.4 "Per-job setup, outside-in"):
//! create the pair, move the peer into the child's netns by PID, attach the
//! host end to the bridge (or leave it point-to-point for `isolated`), then
//! configure the peer from inside the child's netns via `nsenter`.

use crate::commands::{run, run_in_netns};
use crate::error::NetError;
use crate::names::VethPair;
use std::net::Ipv4Addr;
use tracing::instrument;

#[instrument(skip(pair))]
pub async fn create_pair(pair: &VethPair) -> Result<(), NetError> {
    run("ip", &["link", "add", &pair.host, "type", "veth", "peer", "name", &pair.peer]).await
}

/// Moves the peer end into the netns identified by `/proc/<pid>/ns/net`
/// (spec.md §4.4 step 2).
#[instrument(skip(pair))]
pub async fn move_peer_to_netns(pair: &VethPair, pid: u32) -> Result<(), NetError> {
    run("ip", &["link", "set", &pair.peer, "netns", &pid.to_string()]).await
}

/// Attaches the host end to `bridge_if` and brings it up (spec.md §4.4 step
/// 3, `bridge`/custom networks only; `isolated` skips this and stays
/// point-to-point).
#[instrument(skip(pair))]
pub async fn attach_to_bridge(pair: &VethPair, bridge_if: &str) -> Result<(), NetError> {
    run("ip", &["link", "set", &pair.host, "master", bridge_if]).await?;
    run("ip", &["link", "set", &pair.host, "up"]).await
}

#[instrument(skip(pair))]
pub async fn bring_host_end_up(pair: &VethPair) -> Result<(), NetError> {
    run("ip", &["link", "set", &pair.host, "up"]).await
}

/// Configures the peer from inside the child's netns (spec.md §4.4 step 4):
/// loopback up, address assignment, peer up, default route via `gateway`.
#[instrument(skip(pair))]
pub async fn configure_peer(
    pid: u32,
    pair: &VethPair,
    ip: Ipv4Addr,
    prefix_len: u8,
    gateway: Ipv4Addr,
) -> Result<(), NetError> {
    run_in_netns(pid, &["link", "set", "lo", "up"]).await?;
    run_in_netns(pid, &["addr", "add", &format!("{ip}/{prefix_len}"), "dev", &pair.peer]).await?;
    run_in_netns(pid, &["link", "set", &pair.peer, "up"]).await?;
    run_in_netns(pid, &["route", "add", "default", "via", &gateway.to_string()]).await?;
    Ok(())
}

/// Teardown: removing the host end also removes the peer inside the
/// (now-dead) netns (spec.md §4.4 "Teardown").
#[instrument(skip(pair))]
pub async fn remove_host_end(pair: &VethPair) -> Result<(), NetError> {
    run("ip", &["link", "delete", &pair.host]).await
}
