// SPDX-License-Identifier: MIT

//! Overflow policy for the persistence queue (spec.md §4.5 "Overflow
//! policies"): what happens when the disk writer can't keep up with the
//! hot write path. Subscriber fan-out (`subscriber.rs`) always drops on
//! backpressure regardless of this policy — this module only governs the
//! at-most-once persistence queue.

use serde::{Deserialize, Serialize};

/// Default is `Compress`: the persist queue item is kept but its bytes are
/// gzip-compressed harder before spilling to the shard writer, trading CPU
/// for queue headroom instead of losing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Compress,
    /// Spill the overflowing batch straight to an unindexed spill file
    /// instead of the normal shard, to be merged back in on next rotation.
    Spill,
    /// Keep only every Nth chunk once the queue is over capacity.
    Sample { every: u32 },
    /// Drop the chunk and surface the condition as a job event; used by
    /// operators who would rather know than silently degrade.
    Alert,
}

/// Outcome of applying a policy to one overflowing enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowAction {
    Keep,
    Drop,
}

impl OverflowPolicy {
    /// `seq` is the chunk's sequence number within its stream, used by
    /// `Sample` to decide which chunks survive.
    pub fn decide(&self, seq: u64) -> OverflowAction {
        match self {
            OverflowPolicy::Compress | OverflowPolicy::Spill | OverflowPolicy::Alert => OverflowAction::Keep,
            OverflowPolicy::Sample { every } => {
                if *every == 0 || seq % u64::from(*every) == 0 {
                    OverflowAction::Keep
                } else {
                    OverflowAction::Drop
                }
            }
        }
    }
}
