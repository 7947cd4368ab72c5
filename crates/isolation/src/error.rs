// SPDX-License-Identifier: MIT

use std::path::PathBuf;

/// Well-known child exit codes (spec.md §4.2 "Failure semantics").
pub const EXIT_EXEC_FAILURE: i32 = 1;
pub const EXIT_NETWORK_READY_TIMEOUT: i32 = 2;
pub const EXIT_MOUNT_SETUP_FAILURE: i32 = 3;
pub const EXIT_NAMESPACE_VERIFICATION_FAILURE: i32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("cgroup setup failed: {0}")]
    Cgroup(#[from] joblet_cgroup::CgroupError),
    #[error("network setup failed: {0}")]
    Network(#[from] joblet_net::NetError),
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),
    #[error("pipe setup failed: {0}")]
    Pipe(#[source] std::io::Error),
    #[error("rendezvous file error: {0}")]
    Rendezvous(#[source] std::io::Error),
    #[error("mount source {source_path} escapes its permitted subtree")]
    MountEscapesSubtree { source_path: PathBuf },
    #[error("serializing exec descriptor failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors the *child* (init process) can encounter, each mapped to one of
/// the well-known exit codes above.
#[derive(Debug, thiserror::Error)]
pub enum ChildError {
    #[error("rendezvous file never appeared")]
    NetworkReadyTimeout,
    #[error("mount setup failed: {0}")]
    MountSetup(String),
    #[error("expected to be pid 1 in the new namespace")]
    NamespaceVerification,
    #[error("exec failed: {0}")]
    Exec(#[source] nix::Error),
    #[error("invalid command or argument: {0}")]
    InvalidArgument(#[source] std::ffi::NulError),
}

impl ChildError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ChildError::NetworkReadyTimeout => EXIT_NETWORK_READY_TIMEOUT,
            ChildError::MountSetup(_) => EXIT_MOUNT_SETUP_FAILURE,
            ChildError::NamespaceVerification => EXIT_NAMESPACE_VERIFICATION_FAILURE,
            ChildError::Exec(_) | ChildError::InvalidArgument(_) => EXIT_EXEC_FAILURE,
        }
    }
}
