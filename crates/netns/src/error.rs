// SPDX-License-Identifier: MIT

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("ip pool for network {network} is exhausted")]
    PoolExhausted { network: String },

    #[error("ip {ip} does not belong to network {network}")]
    NotInPool { network: String, ip: std::net::Ipv4Addr },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn { command: String, source: std::io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
}
