// SPDX-License-Identifier: MIT

//! Subscriber fan-out (spec.md §4.5 "Write path (hot)"): a non-blocking
//! enqueue into every live subscriber's per-subscriber buffer. A subscriber
//! that falls behind is marked slow and evicted, its sequence aborted with
//! `BACKPRESSURE_DROPPED` rather than ever blocking the writer.

use joblet_wire::status::{BackpressureDropped, LogChunk, Stream};
use tokio::sync::mpsc;

/// What a subscriber receives: either a live chunk or the terminal
/// backpressure sentinel that closes its stream.
#[derive(Debug, Clone)]
pub enum LogEvent {
    Chunk(LogChunk),
    Dropped(BackpressureDropped),
}

/// Per-subscriber bounded channel. `send` never blocks the caller: a full
/// buffer marks the subscriber dead rather than waiting for it to drain.
pub struct Subscriber {
    job_id: joblet_core::JobId,
    stream: Stream,
    tx: mpsc::Sender<LogEvent>,
    dropped_count: u64,
    dead: bool,
}

impl Subscriber {
    pub fn new(job_id: joblet_core::JobId, stream: Stream, capacity: usize) -> (Self, mpsc::Receiver<LogEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { job_id, stream, tx, dropped_count: 0, dead: false }, rx)
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Attempts to deliver `chunk`. Once a subscriber is marked dead it is
    /// never retried; the caller is expected to reap it from its fan-out
    /// list on the next pass.
    pub fn try_send(&mut self, chunk: &LogChunk) {
        if self.dead {
            return;
        }
        match self.tx.try_send(LogEvent::Chunk(chunk.clone())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => self.evict(),
            Err(mpsc::error::TrySendError::Closed(_)) => self.dead = true,
        }
    }

    fn evict(&mut self) {
        self.dropped_count += 1;
        let sentinel = BackpressureDropped {
            job_id: self.job_id,
            stream: self.stream,
            dropped_count: self.dropped_count,
        };
        // Best effort: if even the sentinel can't be enqueued the
        // subscriber's channel is already gone.
        let _ = self.tx.try_send(LogEvent::Dropped(sentinel));
        self.dead = true;
    }
}

/// Fan-out list for one (job, stream) pair. Reaps dead subscribers lazily
/// on the next `broadcast` rather than eagerly, matching the hot write
/// path's "never block the writer" invariant.
#[derive(Default)]
pub struct FanOut {
    subscribers: Vec<Subscriber>,
}

impl FanOut {
    pub fn new() -> Self {
        Self { subscribers: Vec::new() }
    }

    pub fn add(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn broadcast(&mut self, chunk: &LogChunk) {
        for subscriber in &mut self.subscribers {
            subscriber.try_send(chunk);
        }
        self.subscribers.retain(|s| !s.is_dead());
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(seq: u64) -> LogChunk {
        LogChunk {
            job_id: joblet_core::JobId::new(),
            stream: Stream::Stdout,
            seq,
            ts_rfc3339: "t".into(),
            bytes: b"line\n".to_vec(),
        }
    }

    #[tokio::test]
    async fn delivers_chunks_in_order_to_a_live_subscriber() {
        let (mut sub, mut rx) = Subscriber::new(joblet_core::JobId::new(), Stream::Stdout, 4);
        sub.try_send(&chunk(0));
        sub.try_send(&chunk(1));
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first, second) {
            (LogEvent::Chunk(a), LogEvent::Chunk(b)) => assert_eq!((a.seq, b.seq), (0, 1)),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_subscriber_buffer_is_evicted_with_backpressure_sentinel() {
        let (mut sub, mut rx) = Subscriber::new(joblet_core::JobId::new(), Stream::Stdout, 1);
        sub.try_send(&chunk(0));
        sub.try_send(&chunk(1));
        assert!(sub.is_dead());
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, LogEvent::Chunk(c) if c.seq == 0));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, LogEvent::Dropped(d) if d.dropped_count == 1));
    }

    #[tokio::test]
    async fn fanout_reaps_dead_subscribers_after_broadcast() {
        let mut fanout = FanOut::new();
        let (sub, _rx) = Subscriber::new(joblet_core::JobId::new(), Stream::Stdout, 1);
        fanout.add(sub);
        fanout.broadcast(&chunk(0));
        fanout.broadcast(&chunk(1));
        assert!(fanout.is_empty());
    }
}
