// SPDX-License-Identifier: MIT

//! Log Pub/Sub + Persister (LP, spec.md §4.5): per-job ring buffers feed
//! both live subscribers and a gzip JSONL disk persister, with independent
//! overflow handling for each — a slow subscriber is dropped outright,
//! while a slow disk writer degrades under an `OverflowPolicy` instead of
//! ever blocking the job's own stdout/stderr pipe.

pub mod error;
pub mod hub;
pub mod overflow;
pub mod persister;
pub mod ring;
pub mod subscriber;

pub use error::LogError;
pub use hub::LogHub;
pub use overflow::{OverflowAction, OverflowPolicy};
pub use persister::{resume_last_seq, ShardWriter, DEFAULT_SHARD_BYTES};
pub use ring::{chunk_lines, RingBuffer};
pub use subscriber::{FanOut, LogEvent, Subscriber};
