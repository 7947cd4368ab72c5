// SPDX-License-Identifier: MIT

//! The rendezvous file (spec.md §4.2 Phase 3 step 3 / Phase 4 step 1, and
//! REDESIGN FLAGS: "encapsulate it as a single rendezvous object owned by
//! the launcher"). The child blocks on its existence before touching the
//! network; the parent creates it only once NO has finished configuring
//! that network, eliminating the race of a child racing ahead of its own
//! netns setup.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub struct Rendezvous {
    path: PathBuf,
}

impl Rendezvous {
    pub fn new(job_id: joblet_core::JobId) -> Self {
        Self { path: PathBuf::from(format!("/tmp/joblet-network-ready-{job_id}")) }
    }

    /// Reconstructs the rendezvous handle from an already-known path (the
    /// child receives the path via the exec descriptor rather than
    /// recomputing it, so there is exactly one source of truth).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parent side (spec.md §4.2 Phase 3 step 3): create the file via an
    /// atomic rename from a temp path so a concurrently-polling child never
    /// observes a partially-written file.
    pub fn signal_ready(&self) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::File::create(&tmp)?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Child side (spec.md §4.2 Phase 4 step 1): poll every 100ms, cap 10s.
    /// Unlinks the file once observed. Blocking, not async: the init process
    /// is a freshly-forked single-threaded image and must not touch a tokio
    /// runtime it didn't start itself.
    pub fn await_ready(&self) -> Result<(), crate::error::ChildError> {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            if self.path.exists() {
                let _ = std::fs::remove_file(&self.path);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(crate::error::ChildError::NetworkReadyTimeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Unwind path for phase 1-3 failures before the child is running
    /// (spec.md §4.2 "Failure semantics").
    pub fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
