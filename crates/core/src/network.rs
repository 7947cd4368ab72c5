// SPDX-License-Identifier: MIT

//! Network value types (spec.md §3, §4.4). The allocation bitmap and veth
//! orchestration live in `joblet-netns`; this crate only owns the
//! declarative shape so `joblet-core`'s submit validation can check
//! existence/overlap without depending on netns machinery.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// Built-in: host bridge `joblet0`, NAT, inter-container connectivity on.
    Bridge,
    /// Built-in: point-to-point veth with NAT, no inter-job connectivity.
    Isolated,
    /// Built-in: new netns with only loopback.
    None,
    /// User-defined name + CIDR; bridge created on first job use.
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDef {
    pub name: String,
    pub kind: NetworkKind,
    /// CIDR, e.g. `172.20.0.0/16`. Required for `Bridge`/`Custom`; unused for
    /// `Isolated`/`None`.
    pub cidr: Option<ipnet::Ipv4Net>,
    pub bridge_if: Option<String>,
}

impl NetworkDef {
    pub fn bridge() -> Self {
        Self {
            name: "bridge".into(),
            kind: NetworkKind::Bridge,
            cidr: "172.20.0.0/16".parse().ok(),
            bridge_if: Some("joblet0".into()),
        }
    }

    pub fn isolated() -> Self {
        Self { name: "isolated".into(), kind: NetworkKind::Isolated, cidr: None, bridge_if: None }
    }

    pub fn none() -> Self {
        Self { name: "none".into(), kind: NetworkKind::None, cidr: None, bridge_if: None }
    }

    pub fn custom(name: impl Into<String>, cidr: ipnet::Ipv4Net) -> Self {
        let name = name.into();
        Self {
            bridge_if: Some(format!("jbl-{}", crate::slug::short_slug(&name))),
            name,
            kind: NetworkKind::Custom,
            cidr: Some(cidr),
        }
    }

    /// spec.md §8: "Custom network CIDR overlap with existing network →
    /// network creation fails."
    pub fn overlaps(&self, other: &NetworkDef) -> bool {
        match (self.cidr, other.cidr) {
            (Some(a), Some(b)) => a.contains(&b.addr()) || b.contains(&a.addr()) || a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_always_exist_with_expected_shape() {
        assert_eq!(NetworkDef::bridge().cidr.unwrap().to_string(), "172.20.0.0/16");
        assert!(NetworkDef::isolated().cidr.is_none());
        assert!(NetworkDef::none().cidr.is_none());
    }

    #[test]
    fn overlapping_custom_cidrs_are_detected() {
        let a = NetworkDef::custom("a", "10.1.0.0/16".parse().unwrap());
        let b = NetworkDef::custom("b", "10.1.5.0/24".parse().unwrap());
        let c = NetworkDef::custom("c", "10.2.0.0/16".parse().unwrap());
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
