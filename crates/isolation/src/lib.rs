// SPDX-License-Identifier: MIT

//! The Isolation Launcher (IL, spec.md §4.2): kernel-enforced job isolation
//! via namespaces, cgroups, and a staged `pivot_root`. Owns the two-phase
//! launch protocol end to end — cgroup and network setup on the tokio
//! runtime, fork/unshare/exec off it.

pub mod descriptor;
pub mod error;
pub mod init;
pub mod launcher;
pub mod mount_plan;
pub mod rendezvous;

pub use descriptor::ExecDescriptor;
pub use error::{ChildError, LaunchError};
pub use launcher::{launch, LaunchOutcome, LaunchRequest, ReapedExit};
pub use mount_plan::{MountEntry, MountPlanBuilder};
pub use rendezvous::Rendezvous;
