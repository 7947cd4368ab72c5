// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime {name}-{version} not found under {root}")]
    NotFound { name: String, version: String, root: PathBuf },

    #[error("no versions of runtime {name} are installed under {root}")]
    NoVersions { name: String, root: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },

    #[error("runtime {name}-{version} mount source {source_path} escapes its isolated/ subtree")]
    MountEscapesIsolated { name: String, version: String, source_path: PathBuf },
}
