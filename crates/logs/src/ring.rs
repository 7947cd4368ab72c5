// SPDX-License-Identifier: MIT

//! Per-(job,stream) ring buffer (spec.md §4.5 "Architecture"): bounded in
//! bytes, assigns the monotonically increasing sequence number, and keeps
//! the in-memory "tail" a fresh subscriber replays from the persisted
//! handover offset up to the live edge.

use joblet_wire::status::{LogChunk, Stream};
use std::collections::VecDeque;

pub struct RingBuffer {
    job_id: joblet_core::JobId,
    stream: Stream,
    capacity_bytes: usize,
    bytes: usize,
    chunks: VecDeque<LogChunk>,
    next_seq: u64,
}

impl RingBuffer {
    pub fn new(job_id: joblet_core::JobId, stream: Stream, capacity_bytes: usize) -> Self {
        Self::resuming_at(job_id, stream, capacity_bytes, 0)
    }

    /// Resumes numbering so the next `push` is assigned `next_seq` (spec.md
    /// §4.5 "at-most-once" resume semantics: callers pass `last_written_seq
    /// + 1`, or `0` when nothing was persisted yet).
    pub fn resuming_at(job_id: joblet_core::JobId, stream: Stream, capacity_bytes: usize, next_seq: u64) -> Self {
        Self { job_id, stream, capacity_bytes, bytes: 0, chunks: VecDeque::new(), next_seq }
    }

    /// Assigns the next sequence number and appends, evicting the oldest
    /// retained chunks until back under `capacity_bytes`.
    pub fn push(&mut self, ts_rfc3339: String, bytes: Vec<u8>) -> LogChunk {
        let chunk =
            LogChunk { job_id: self.job_id, stream: self.stream, seq: self.next_seq, ts_rfc3339, bytes };
        self.next_seq += 1;
        self.bytes += chunk.bytes.len();
        self.chunks.push_back(chunk.clone());
        while self.bytes > self.capacity_bytes {
            match self.chunks.pop_front() {
                Some(evicted) => self.bytes -= evicted.bytes.len(),
                None => break,
            }
        }
        chunk
    }

    /// Replays every retained chunk with `seq > since_seq` (spec.md §4.5
    /// "Read path" handover).
    pub fn tail_since(&self, since_seq: u64) -> Vec<LogChunk> {
        self.chunks.iter().filter(|c| c.seq > since_seq).cloned().collect()
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }
}

/// Splits raw bytes into line-aware chunks capped at `max_chunk_bytes`
/// (spec.md §4.5 "Write path (hot)": "bounded line-aware segments, capped
/// at, e.g., 16 KiB"). A line longer than the cap is hard-split.
pub fn chunk_lines(data: &[u8], max_chunk_bytes: usize) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for byte in data {
        current.push(*byte);
        if *byte == b'\n' || current.len() >= max_chunk_bytes {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
