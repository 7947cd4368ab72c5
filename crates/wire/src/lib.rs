// SPDX-License-Identifier: MIT

//! Wire protocol for daemon communication (spec.md §6).
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload, carried over
//! a Unix domain socket. One request, one or more streamed responses,
//! terminated by a `Response::Done` frame (SPEC_FULL.md §6).

mod request;
mod response;
mod status;
mod wire;

pub use request::{JobFilter, Request};
pub use response::Response;
pub use status::{
    BackpressureDropped, CpuSample, IoSample, JobStatusView, LogChunk, MemorySample, MetricSample,
    NetworkView, NodeInfo, PidsSample, PressureSample, RuntimeView, Stream, VolumeView,
    WorkflowJobSlot, WorkflowStatusView,
};
pub use wire::{decode, encode, read_message, read_request, write_message, write_response, ProtocolError};
