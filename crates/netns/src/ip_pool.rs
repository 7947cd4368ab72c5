// SPDX-License-Identifier: MIT

//! Per-network IP allocation bitmap (spec.md §4.4 step 1: "allocates an IP
//! from the network's free pool (marks it reserved)"). Host-part 0 is the
//! network address, 1 is reserved for the bridge gateway, and the highest
//! host-part is the broadcast address for prefixes shorter than /31 — none
//! of those are ever handed out.

use crate::error::NetError;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

pub struct IpPool {
    cidr: Ipv4Net,
    /// `allocated[host_part]` — one bit per address in the network.
    allocated: Vec<bool>,
}

impl IpPool {
    pub fn new(cidr: Ipv4Net) -> Self {
        let size = 1u64 << (32 - cidr.prefix_len() as u32);
        let mut allocated = vec![false; size as usize];
        allocated[0] = true; // network address
        if let Some(last) = allocated.last_mut() {
            *last = true; // broadcast
        }
        if allocated.len() > 2 {
            allocated[1] = true; // gateway
        }
        Self { cidr, allocated }
    }

    pub fn gateway(&self) -> Ipv4Addr {
        host_at(self.cidr, 1)
    }

    pub fn prefix_len(&self) -> u8 {
        self.cidr.prefix_len()
    }

    /// Lowest-clear-bit allocation (spec.md §4.4; deterministic, smallest
    /// free address first).
    pub fn allocate(&mut self) -> Result<Ipv4Addr, NetError> {
        let slot = self.allocated.iter().position(|taken| !taken).ok_or_else(|| {
            NetError::PoolExhausted { network: self.cidr.to_string() }
        })?;
        self.allocated[slot] = true;
        Ok(host_at(self.cidr, slot as u32))
    }

    pub fn release(&mut self, ip: Ipv4Addr) -> Result<(), NetError> {
        let host = host_part(self.cidr, ip)
            .ok_or_else(|| NetError::NotInPool { network: self.cidr.to_string(), ip })?;
        self.allocated[host as usize] = false;
        Ok(())
    }
}

fn host_at(cidr: Ipv4Net, host_part: u32) -> Ipv4Addr {
    let base = u32::from(cidr.network());
    Ipv4Addr::from(base + host_part)
}

fn host_part(cidr: Ipv4Net, ip: Ipv4Addr) -> Option<u32> {
    if !cidr.contains(&ip) {
        return None;
    }
    Some(u32::from(ip) - u32::from(cidr.network()))
}

/// Allocates whole `/30` blocks out of a larger CIDR rather than individual
/// addresses — used for `isolated` networks, where each job gets its own
/// point-to-point pair and must not share a block with any other job.
pub struct BlockPool {
    base: u32,
    allocated: Vec<bool>,
}

impl BlockPool {
    pub fn new(cidr: Ipv4Net) -> Self {
        let host_bits = 32 - cidr.prefix_len() as u32;
        let block_count = (1u64 << host_bits) / 4;
        Self { base: u32::from(cidr.network()), allocated: vec![false; block_count as usize] }
    }

    /// Returns the block's first two usable addresses: `(host, peer)`.
    pub fn allocate(&mut self) -> Result<(Ipv4Addr, Ipv4Addr), NetError> {
        let slot = self
            .allocated
            .iter()
            .position(|taken| !taken)
            .ok_or_else(|| NetError::PoolExhausted { network: "isolated".into() })?;
        self.allocated[slot] = true;
        let block_base = self.base + (slot as u32) * 4;
        Ok((Ipv4Addr::from(block_base + 1), Ipv4Addr::from(block_base + 2)))
    }

    pub fn release(&mut self, host_ip: Ipv4Addr) {
        let offset = u32::from(host_ip).wrapping_sub(self.base);
        let slot = (offset / 4) as usize;
        if let Some(taken) = self.allocated.get_mut(slot) {
            *taken = false;
        }
    }
}
