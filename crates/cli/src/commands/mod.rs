// SPDX-License-Identifier: MIT

//! `joblet` CLI command implementations. One module per resource kind,
//! mirroring the wire protocol's operation grouping (SPEC_FULL.md §6).

pub mod job;
pub mod network;
pub mod node;
pub mod runtime;
pub mod volume;
pub mod workflow;
