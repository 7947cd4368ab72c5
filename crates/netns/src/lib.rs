// SPDX-License-Identifier: MIT

//! The Network Orchestrator (spec.md §4.4): built-in `bridge`/`isolated`/
//! `none` networks plus user-defined custom CIDRs, veth pair construction,
//! per-network IP allocation, and the rendezvous-adjacent netns
//! configuration that runs between IL's fork and its final exec.

pub mod bridge;
pub mod commands;
pub mod error;
pub mod hosts;
pub mod ip_pool;
pub mod names;
pub mod orchestrator;
pub mod veth;

pub use error::NetError;
pub use ip_pool::{BlockPool, IpPool};
pub use names::VethPair;
pub use orchestrator::{JobNetwork, NetworkOrchestrator};
