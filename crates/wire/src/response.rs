// SPDX-License-Identifier: MIT

//! Daemon → client response types. Unary requests get exactly one
//! `Response`; streaming requests (`StreamJobLogs`/`StreamJobMetrics`) get
//! zero or more responses followed by `Response::Done` (spec.md §6, SPEC_FULL
//! §6 "terminated by a Done frame").

use crate::status::{LogChunk, MetricSample, NetworkView, NodeInfo, RuntimeView, VolumeView};
use crate::{BackpressureDropped, JobStatusView, WorkflowStatusView};
use joblet_core::{JobId, WorkflowId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Ok,
    Pong,
    Hello { server_version: String },

    JobAccepted { id: JobId },
    JobStatus { status: JobStatusView },
    Jobs { jobs: Vec<JobStatusView> },

    WorkflowAccepted { id: WorkflowId },
    WorkflowStatus { status: WorkflowStatusView },

    LogChunk(LogChunk),
    BackpressureDropped(BackpressureDropped),
    MetricSample(MetricSample),

    Networks { networks: Vec<NetworkView> },
    Volumes { volumes: Vec<VolumeView> },
    Runtimes { runtimes: Vec<RuntimeView> },

    NodeInfo { info: NodeInfo },

    /// Terminates a streaming response sequence cleanly (spec.md §4.1
    /// "the sequence terminates cleanly" once the job reaches terminal state).
    Done,

    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error { code: code.into(), message: message.into() }
    }

    pub fn is_terminal_frame(&self) -> bool {
        matches!(self, Response::Done | Response::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_constructor_sets_both_fields() {
        let r = Response::error("INVALID_SPEC", "command is empty");
        match r {
            Response::Error { code, message } => {
                assert_eq!(code, "INVALID_SPEC");
                assert_eq!(message, "command is empty");
            }
            _ => panic!("expected Error variant"),
        }
    }

    #[test]
    fn done_and_error_are_terminal_frames() {
        assert!(Response::Done.is_terminal_frame());
        assert!(Response::error("X", "y").is_terminal_frame());
        assert!(!Response::Ok.is_terminal_frame());
    }
}
