// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open log shard {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },
    #[error("failed to write log shard {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to read log shard {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("malformed log line in {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },
}
