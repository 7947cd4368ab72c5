// SPDX-License-Identifier: MIT

//! The Network Orchestrator (NO, spec.md §4.4): owns IP pools, veth pair
//! lifecycle, and the (optional) `/etc/hosts` convenience entries. One
//! instance per daemon; short critical sections under a single mutex, the
//! same pattern `joblet-core::clock` / the teacher's scheduler use for
//! shared mutable state touched from async tasks.

use crate::bridge;
use crate::error::NetError;
use crate::hosts;
use crate::ip_pool::{BlockPool, IpPool};
use crate::names::VethPair;
use crate::veth;
use joblet_core::{JobId, NetworkDef, NetworkKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tracing::instrument;

/// Reserved for `isolated` networks' point-to-point /30 blocks — never
/// routable, never overlaps a user-declared custom CIDR (spec.md §3
/// "non-overlapping with every other network").
const ISOLATED_BASE: &str = "169.254.100.0/24";

/// Everything NO needs to tear a job's networking back down.
pub struct JobNetwork {
    pub veth: VethPair,
    pub network_name: String,
    pub ip: Option<Ipv4Addr>,
}

struct NetworkState {
    def: NetworkDef,
    pool: Option<IpPool>,
    bridge_ready: bool,
}

pub struct NetworkOrchestrator {
    networks: Mutex<HashMap<String, NetworkState>>,
    isolated_blocks: Mutex<BlockPool>,
}

impl NetworkOrchestrator {
    pub fn new() -> Self {
        let orch = Self {
            networks: Mutex::new(HashMap::new()),
            isolated_blocks: Mutex::new(BlockPool::new(ISOLATED_BASE.parse().unwrap())),
        };
        orch.register(NetworkDef::bridge());
        orch.register(NetworkDef::isolated());
        orch.register(NetworkDef::none());
        orch
    }

    /// Registers a network definition (built-in at startup, custom on
    /// `CreateNetwork`). The backing bridge/pool is materialized lazily on
    /// first job use (spec.md §4.4: "a dedicated bridge is created on first
    /// job use").
    pub fn register(&self, def: NetworkDef) {
        let pool = def.cidr.map(IpPool::new);
        self.networks.lock().insert(def.name.clone(), NetworkState { def, pool, bridge_ready: false });
    }

    pub fn unregister(&self, name: &str) {
        self.networks.lock().remove(name);
    }

    pub fn exists(&self, name: &str) -> bool {
        self.networks.lock().contains_key(name)
    }

    /// All registered network definitions, for `ListNetworks` and
    /// `CreateNetwork`'s CIDR overlap check (spec.md §8: "Custom network
    /// CIDR overlap with existing network -> network creation fails").
    pub fn list(&self) -> Vec<NetworkDef> {
        self.networks.lock().values().map(|s| s.def.clone()).collect()
    }

    /// Sets up networking for a freshly-forked child (spec.md §4.4
    /// "Per-job setup, outside-in"). `pid` is the child's PID, already in
    /// its own netns via `CLONE_NEWNET`.
    #[instrument(skip(self))]
    pub async fn setup_job_network(
        &self,
        job_id: JobId,
        pid: u32,
        network_name: &str,
    ) -> Result<JobNetwork, NetError> {
        let kind = self.networks.lock().get(network_name).map(|s| s.def.kind);
        let Some(kind) = kind else {
            return Err(NetError::CommandFailed {
                command: "setup_job_network".into(),
                stderr: format!("unknown network {network_name}"),
            });
        };

        match kind {
            NetworkKind::None => {
                Ok(JobNetwork { veth: VethPair::generate(), network_name: network_name.into(), ip: None })
            }
            NetworkKind::Bridge | NetworkKind::Custom => {
                self.ensure_bridge_ready(network_name).await?;
                let (ip, prefix_len, gateway, bridge_if) = {
                    let mut networks = self.networks.lock();
                    let state = networks.get_mut(network_name).expect("checked above");
                    let pool = state.pool.as_mut().expect("bridge/custom always has a cidr");
                    let ip = pool.allocate()?;
                    (ip, pool.prefix_len(), pool.gateway(), state.def.bridge_if.clone().unwrap_or_default())
                };
                let pair = VethPair::generate();
                veth::create_pair(&pair).await?;
                veth::move_peer_to_netns(&pair, pid).await?;
                veth::attach_to_bridge(&pair, &bridge_if).await?;
                veth::configure_peer(pid, &pair, ip, prefix_len, gateway).await?;
                Ok(JobNetwork { veth: pair, network_name: network_name.into(), ip: Some(ip) })
            }
            NetworkKind::Isolated => {
                let (host_ip, peer_ip) = self.isolated_blocks.lock().allocate()?;
                let pair = VethPair::generate();
                veth::create_pair(&pair).await?;
                veth::move_peer_to_netns(&pair, pid).await?;
                run_host_addr(&pair, host_ip).await?;
                veth::bring_host_end_up(&pair).await?;
                veth::configure_peer(pid, &pair, peer_ip, 30, host_ip).await?;
                Ok(JobNetwork { veth: pair, network_name: network_name.into(), ip: Some(peer_ip) })
            }
        }
    }

    /// Teardown (spec.md §4.4): remove the veth host-end, release the IP,
    /// remove `/etc/hosts` augmentations. Idempotent — called unconditionally
    /// on every terminal transition.
    #[instrument(skip(self, job_net))]
    pub async fn teardown_job_network(&self, _job_id: JobId, job_net: &JobNetwork) -> Result<(), NetError> {
        if job_net.network_name == "none" {
            return Ok(());
        }
        let _ = veth::remove_host_end(&job_net.veth).await;

        if let Some(ip) = job_net.ip {
            let mut networks = self.networks.lock();
            let has_pool = networks.get_mut(&job_net.network_name).map(|s| s.pool.is_some()).unwrap_or(false);
            if has_pool {
                if let Some(state) = networks.get_mut(&job_net.network_name) {
                    let _ = state.pool.as_mut().expect("checked above").release(ip);
                }
            } else {
                // `isolated`: `ip` is the block's peer address, host is one below it.
                let host_ip = Ipv4Addr::from(u32::from(ip) - 1);
                self.isolated_blocks.lock().release(host_ip);
            }
        }
        Ok(())
    }

    pub fn add_sibling_hosts(
        &self,
        etc_hosts: &std::path::Path,
        job_id: JobId,
        siblings: &[(String, Ipv4Addr)],
    ) -> Result<(), NetError> {
        hosts::add_entries(etc_hosts, job_id, siblings)
    }

    pub fn remove_sibling_hosts(&self, etc_hosts: &std::path::Path, job_id: JobId) -> Result<(), NetError> {
        hosts::remove_entries(etc_hosts, job_id)
    }

    async fn ensure_bridge_ready(&self, network_name: &str) -> Result<(), NetError> {
        let (bridge_if, gateway, prefix_len, already_ready) = {
            let mut networks = self.networks.lock();
            let state = networks.get_mut(network_name).expect("caller checked existence");
            let bridge_if = state.def.bridge_if.clone().unwrap_or_default();
            let gateway = state.pool.as_ref().map(|p| p.gateway()).unwrap_or(Ipv4Addr::UNSPECIFIED);
            let prefix_len = state.pool.as_ref().map(|p| p.prefix_len()).unwrap_or(32);
            let ready = state.bridge_ready;
            if !ready {
                state.bridge_ready = true;
            }
            (bridge_if, gateway, prefix_len, ready)
        };
        if already_ready || bridge_if.is_empty() {
            return Ok(());
        }
        if !bridge::exists(&bridge_if).await {
            bridge::create(&bridge_if, gateway, prefix_len).await?;
        }
        Ok(())
    }
}

impl Default for NetworkOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_host_addr(pair: &VethPair, host_ip: Ipv4Addr) -> Result<(), NetError> {
    crate::commands::run("ip", &["addr", "add", &format!("{host_ip}/30"), "dev", &pair.host]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_networks_are_registered_on_construction() {
        let orch = NetworkOrchestrator::new();
        assert!(orch.exists("bridge"));
        assert!(orch.exists("isolated"));
        assert!(orch.exists("none"));
    }

    #[test]
    fn unregister_removes_a_custom_network() {
        let orch = NetworkOrchestrator::new();
        orch.register(NetworkDef::custom("staging", "10.5.0.0/24".parse().unwrap()));
        assert!(orch.exists("staging"));
        orch.unregister("staging");
        assert!(!orch.exists("staging"));
    }

    #[test]
    fn list_includes_builtins_and_registered_custom_networks() {
        let orch = NetworkOrchestrator::new();
        orch.register(NetworkDef::custom("staging", "10.5.0.0/24".parse().unwrap()));
        let names: Vec<String> = orch.list().into_iter().map(|d| d.name).collect();
        assert!(names.contains(&"bridge".to_string()));
        assert!(names.contains(&"staging".to_string()));
    }
}
