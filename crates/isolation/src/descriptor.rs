// SPDX-License-Identifier: MIT

//! The execution descriptor (spec.md §4.2 Phase 3 step 4: "command, args,
//! env, workdir, uid/gid, the full mount plan"), handed from parent to
//! child over the handoff pipe as a single length-prefixed JSON frame.

use crate::mount_plan::MountEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecDescriptor {
    pub job_id: joblet_core::JobId,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: PathBuf,
    pub uid: u32,
    pub gid: u32,
    /// The staging directory the mount plan assembles before `pivot_root`
    /// (spec.md §4.2 Phase 4 steps 3-4). `mounts[].target` is relative to
    /// this directory.
    pub job_root: PathBuf,
    pub mounts: Vec<MountEntry>,
    pub hostname: String,
    /// Rendezvous file path the child polls for (spec.md §4.2 Phase 4 step
    /// 1), also exported into the job's env as `NETWORK_READY_FILE`.
    pub network_ready_file: PathBuf,
}

impl ExecDescriptor {
    pub fn write_to(&self, w: &mut impl std::io::Write) -> Result<(), crate::error::LaunchError> {
        let bytes = serde_json::to_vec(self)?;
        let len = (bytes.len() as u32).to_be_bytes();
        w.write_all(&len).map_err(crate::error::LaunchError::Pipe)?;
        w.write_all(&bytes).map_err(crate::error::LaunchError::Pipe)?;
        Ok(())
    }

    pub fn read_from(r: &mut impl std::io::Read) -> std::io::Result<Self> {
        let mut len_buf = [0u8; 4];
        r.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        serde_json::from_slice(&buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
