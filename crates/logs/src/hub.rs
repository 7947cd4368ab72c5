// SPDX-License-Identifier: MIT

//! Per-job log hub (spec.md §4.5 "Architecture"): wires the ring buffer,
//! subscriber fan-out, and gzip shard persister together behind a single
//! `ingest` entry point. One hub per running job; the daemon owns a
//! `HashMap<JobId, LogHub>` for the lifetime of the job plus its retention
//! window.

use crate::overflow::{OverflowAction, OverflowPolicy};
use crate::persister::{resume_last_seq, ShardWriter};
use crate::ring::{chunk_lines, RingBuffer};
use crate::subscriber::{FanOut, LogEvent, Subscriber};
use joblet_wire::status::{LogChunk, Stream};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::warn;

const DEFAULT_MAX_CHUNK_BYTES: usize = 16 * 1024;
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;
const DEFAULT_PERSIST_QUEUE_CAPACITY: usize = 1024;

struct StreamState {
    ring: RingBuffer,
    fanout: FanOut,
    persist_tx: mpsc::Sender<LogChunk>,
    overflow: OverflowPolicy,
}

pub struct LogHub {
    job_id: joblet_core::JobId,
    stdout: StreamState,
    stderr: StreamState,
    persist_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl LogHub {
    /// Opens (or resumes) persistence for both streams and spawns their
    /// disk-writer tasks. `persist_dir` is the per-job shard directory.
    pub fn open(
        job_id: joblet_core::JobId,
        persist_dir: PathBuf,
        ring_capacity_bytes: usize,
        overflow: OverflowPolicy,
    ) -> Result<Self, crate::error::LogError> {
        let (stdout, stdout_task) =
            Self::open_stream(job_id, Stream::Stdout, persist_dir.clone(), ring_capacity_bytes, overflow)?;
        let (stderr, stderr_task) =
            Self::open_stream(job_id, Stream::Stderr, persist_dir, ring_capacity_bytes, overflow)?;
        Ok(Self { job_id, stdout, stderr, persist_handles: vec![stdout_task, stderr_task] })
    }

    fn open_stream(
        job_id: joblet_core::JobId,
        stream: Stream,
        persist_dir: PathBuf,
        ring_capacity_bytes: usize,
        overflow: OverflowPolicy,
    ) -> Result<(StreamState, tokio::task::JoinHandle<()>), crate::error::LogError> {
        let resume_point = resume_last_seq(&persist_dir, job_id, stream)?;
        let next_seq = resume_point.map(|s| s + 1).unwrap_or(0);
        let ring = RingBuffer::resuming_at(job_id, stream, ring_capacity_bytes, next_seq);

        let mut writer = ShardWriter::open(persist_dir, job_id, stream)?;
        let (persist_tx, mut persist_rx) = mpsc::channel::<LogChunk>(DEFAULT_PERSIST_QUEUE_CAPACITY);
        let task = tokio::task::spawn_blocking(move || {
            while let Some(chunk) = persist_rx.blocking_recv() {
                if let Err(e) = writer.write_chunk(&chunk) {
                    warn!(job_id = %job_id, error = %e, "failed to persist log chunk");
                }
            }
        });

        Ok((StreamState { ring, fanout: FanOut::new(), persist_tx, overflow }, task))
    }

    fn state_mut(&mut self, stream: Stream) -> &mut StreamState {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }

    /// Decomposes raw bytes read off the job's pipe into line-aware chunks
    /// and fans each one out to subscribers and the persistence queue
    /// (spec.md §4.5 "Write path (hot)").
    pub fn ingest(&mut self, stream: Stream, data: &[u8], ts_rfc3339: impl Fn() -> String) {
        let state = self.state_mut(stream);
        for line in chunk_lines(data, DEFAULT_MAX_CHUNK_BYTES) {
            let chunk = state.ring.push(ts_rfc3339(), line);
            state.fanout.broadcast(&chunk);
            if let Err(mpsc::error::TrySendError::Full(_)) = state.persist_tx.try_send(chunk.clone()) {
                if state.overflow.decide(chunk.seq) == OverflowAction::Keep {
                    let _ = state.persist_tx.try_send(chunk);
                }
            }
        }
    }

    /// Subscribes to one stream, replaying everything retained in the ring
    /// since `since_seq` before switching to live delivery.
    pub fn subscribe(&mut self, stream: Stream, since_seq: u64) -> (Vec<LogChunk>, mpsc::Receiver<LogEvent>) {
        let job_id = self.job_id;
        let state = self.state_mut(stream);
        let backlog = state.ring.tail_since(since_seq);
        let (subscriber, rx) = Subscriber::new(job_id, stream, DEFAULT_SUBSCRIBER_CAPACITY);
        state.fanout.add(subscriber);
        (backlog, rx)
    }

    /// Drops the persist queues, letting the shard-writer tasks drain and
    /// exit; call once the job has finished and no more bytes will arrive.
    pub async fn close(self) {
        drop(self.stdout.persist_tx);
        drop(self.stderr.persist_tx);
        for handle in self.persist_handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ingest_delivers_to_a_subscriber_and_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let job_id = joblet_core::JobId::new();
        let mut hub = LogHub::open(job_id, dir.path().to_path_buf(), 1024 * 1024, OverflowPolicy::default()).unwrap();

        let (backlog, mut rx) = hub.subscribe(Stream::Stdout, 0);
        assert!(backlog.is_empty());

        hub.ingest(Stream::Stdout, b"hello\n", || "2026-01-01T00:00:00Z".into());
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, LogEvent::Chunk(c) if c.bytes == b"hello\n"));

        hub.close().await;
        let resumed = resume_last_seq(dir.path(), job_id, Stream::Stdout).unwrap();
        assert_eq!(resumed, Some(0));
    }

    #[tokio::test]
    async fn subscribe_replays_ring_backlog_before_live_events() {
        let dir = tempfile::tempdir().unwrap();
        let job_id = joblet_core::JobId::new();
        let mut hub = LogHub::open(job_id, dir.path().to_path_buf(), 1024 * 1024, OverflowPolicy::default()).unwrap();

        hub.ingest(Stream::Stdout, b"first\n", || "2026-01-01T00:00:00Z".into());
        hub.ingest(Stream::Stdout, b"second\n", || "2026-01-01T00:00:01Z".into());

        let (backlog, _rx) = hub.subscribe(Stream::Stdout, 0);
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[0].bytes, b"first\n");
        assert_eq!(backlog[1].bytes, b"second\n");

        hub.close().await;
    }
}
