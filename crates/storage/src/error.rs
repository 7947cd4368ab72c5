// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on {path}: {source}")]
    Wal { path: PathBuf, source: std::io::Error },
    #[error("socket i/o error: {0}")]
    Socket(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] joblet_wire::ProtocolError),
    #[error("malformed WAL entry in {path} at offset {offset}: {detail}")]
    Corrupt { path: PathBuf, offset: u64, detail: String },
}
