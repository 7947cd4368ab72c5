// SPDX-License-Identifier: MIT

//! Error taxonomy for `LM::submit` and related admission paths (spec.md §4.1,
//! §7). These are the errors a client can actually receive back over the
//! wire; internal setup failures (cgroup/namespace/mount errors) surface
//! instead as a terminal `FAILED` job with a `failure_reason`, never as a
//! `SubmitError`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("invalid job spec: {0}")]
    InvalidSpec(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("referenced {kind} {name:?} does not exist")]
    ReferenceNotFound { kind: &'static str, name: String },

    #[error("workflow dependency graph is invalid: {0}")]
    InvalidWorkflowGraph(String),

    #[error("network {0:?} CIDR overlaps an existing network")]
    NetworkOverlap(String),
}

impl SubmitError {
    /// Stable machine-readable code, mirrored in wire DTOs (spec.md §7).
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::InvalidSpec(_) => "INVALID_SPEC",
            SubmitError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            SubmitError::ReferenceNotFound { .. } => "REFERENCE_NOT_FOUND",
            SubmitError::InvalidWorkflowGraph(_) => "INVALID_WORKFLOW_GRAPH",
            SubmitError::NetworkOverlap(_) => "NETWORK_OVERLAP",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("job {0} not found")]
    NotFound(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("workflow {0} not found")]
    WorkflowNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(SubmitError::InvalidSpec("x".into()).code(), "INVALID_SPEC");
        assert_eq!(
            SubmitError::ReferenceNotFound { kind: "volume", name: "x".into() }.code(),
            "REFERENCE_NOT_FOUND"
        );
    }
}
