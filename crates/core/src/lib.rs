// SPDX-License-Identifier: MIT

//! Shared domain types for Joblet: job identity and state machine, workflow
//! DAG, network/volume/runtime value types, the pure decision layer, and the
//! clock abstraction used to make time-dependent logic testable.
//!
//! Nothing in this crate touches the filesystem, a socket, or a namespace —
//! that's `joblet-cgroup`/`joblet-netns`/`joblet-isolation`/`joblet-logs`.
//! This crate is the vocabulary the rest of the workspace shares.

#[macro_use]
pub mod macros;

pub mod clock;
pub mod decision;
pub mod effect;
pub mod env;
pub mod error;
pub mod event;
pub mod id;
pub mod job;
pub mod network;
pub mod runtime_ref;
pub mod slug;
pub mod timer;
pub mod volume;
pub mod workflow;

pub use clock::{Clock, FakeClock, SystemClock};
pub use effect::Effect;
pub use error::{LookupError, StopError, SubmitError};
pub use event::Event;
pub use id::ShortId;
pub use job::{Job, JobId, JobSpec, JobStatus, NodeId, ResourceRequest, UploadEntry};
pub use network::{NetworkDef, NetworkKind};
pub use runtime_ref::RuntimeRef;
pub use timer::{SubscriptionId, TimerId, TimerKind};
pub use volume::{VolumeDef, VolumeKind};
pub use workflow::{DependencyEdge, ExpectedStatus, Workflow, WorkflowGraphError, WorkflowId, WorkflowJobDef};
