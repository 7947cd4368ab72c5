// SPDX-License-Identifier: MIT

//! Volume value type (spec.md §3). Name unique, declared size, kind,
//! backing path. Mount/unmount refcounting lives with the caller (daemon
//! lifecycle) since it is a cross-job shared-resource concern, not a
//! property of the volume definition itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    /// Backed by a directory on a dedicated filesystem or sparse loopback.
    Filesystem,
    /// Backed by tmpfs.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDef {
    pub name: String,
    pub size_bytes: u64,
    pub kind: VolumeKind,
    pub backing_path: PathBuf,
}

impl VolumeDef {
    /// Mount target for a job referencing this volume, per spec.md §3/§6.
    pub fn job_mount_target(&self) -> PathBuf {
        PathBuf::from("/volumes").join(&self.name)
    }
}
