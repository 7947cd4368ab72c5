// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("failed to create cgroup directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("failed to write {value:?} to control file {path}: {source}")]
    Write { path: PathBuf, value: String, source: std::io::Error },

    #[error("failed to read control file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("malformed content in control file {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("failed to remove cgroup directory {path}: {source}")]
    RemoveDir { path: PathBuf, source: std::io::Error },

    #[error("failed to enumerate block devices under /sys/block: {0}")]
    EnumerateBlockDevices(std::io::Error),
}
