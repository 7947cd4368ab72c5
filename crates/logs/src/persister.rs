// SPDX-License-Identifier: MIT

//! Gzip JSONL shard persistence (spec.md §4.5 "Persistence"): one line per
//! chunk, `{seq, ts, bytes}` with `bytes` base64-encoded, rotated at a
//! configurable size (default 100 MiB). Resume is at-most-once: on
//! restart we scan the last shard, find the highest fully-written `seq`,
//! and the hot path resumes numbering after it — any partially written
//! trailing line from a crash is discarded rather than trusted.
//!
//! Mirrors the teacher's append-only, create-dir-then-open-in-append-mode
//! shape (`crates/engine/src/job_logger.rs`), scaled up to a persistent
//! file handle and gzip framing for the much higher log volume here.

use crate::error::LogError;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use joblet_wire::status::{LogChunk, Stream};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_SHARD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedLine {
    seq: u64,
    ts: String,
    #[serde(with = "base64_bytes")]
    bytes: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

fn stream_label(stream: Stream) -> &'static str {
    match stream {
        Stream::Stdout => "stdout",
        Stream::Stderr => "stderr",
    }
}

/// `dir` is the per-job log root (`<log-root>/<uuid>/`, spec.md §6 "On-disk
/// log shard format"); the shard filename itself only needs the stream and
/// rotation index.
fn shard_path(dir: &Path, stream: Stream, index: u64) -> PathBuf {
    dir.join(format!("{}-{:04}.jsonl.gz", stream_label(stream), index))
}

fn existing_shard_indices(dir: &Path, stream: Stream) -> Vec<u64> {
    let prefix = format!("{}-", stream_label(stream));
    let Ok(entries) = fs::read_dir(dir) else { return Vec::new() };
    let mut indices: Vec<u64> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            let rest = name.strip_prefix(&prefix)?.strip_suffix(".jsonl.gz")?;
            rest.parse::<u64>().ok()
        })
        .collect();
    indices.sort_unstable();
    indices
}

/// Owns the currently-open shard for one (job, stream) pair. `dir` is
/// already job-scoped, so nothing here needs the job id directly — it's
/// only accepted to keep this constructor's signature symmetric with
/// `resume_last_seq`.
pub struct ShardWriter {
    dir: PathBuf,
    stream: Stream,
    index: u64,
    encoder: GzEncoder<File>,
    uncompressed_bytes: u64,
    rotate_at_bytes: u64,
}

impl ShardWriter {
    pub fn open(dir: PathBuf, job_id: joblet_core::JobId, stream: Stream) -> Result<Self, LogError> {
        Self::open_with_limit(dir, job_id, stream, DEFAULT_SHARD_BYTES)
    }

    pub fn open_with_limit(
        dir: PathBuf,
        _job_id: joblet_core::JobId,
        stream: Stream,
        rotate_at_bytes: u64,
    ) -> Result<Self, LogError> {
        fs::create_dir_all(&dir).map_err(|source| LogError::Open { path: dir.clone(), source })?;
        let index = existing_shard_indices(&dir, stream).into_iter().max().unwrap_or(0);
        let path = shard_path(&dir, stream, index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogError::Open { path: path.clone(), source })?;
        Ok(Self {
            dir,
            stream,
            index,
            encoder: GzEncoder::new(file, Compression::default()),
            uncompressed_bytes: 0,
            rotate_at_bytes,
        })
    }

    pub fn write_chunk(&mut self, chunk: &LogChunk) -> Result<(), LogError> {
        let line = PersistedLine { seq: chunk.seq, ts: chunk.ts_rfc3339.clone(), bytes: chunk.bytes.clone() };
        let path = shard_path(&self.dir, self.stream, self.index);
        let serialized =
            serde_json::to_vec(&line).map_err(|e| LogError::Malformed { path: path.clone(), detail: e.to_string() })?;
        self.encoder.write_all(&serialized).map_err(|source| LogError::Write { path: path.clone(), source })?;
        self.encoder.write_all(b"\n").map_err(|source| LogError::Write { path: path.clone(), source })?;
        self.encoder.flush().map_err(|source| LogError::Write { path, source })?;
        self.uncompressed_bytes += serialized.len() as u64 + 1;
        if self.uncompressed_bytes >= self.rotate_at_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), LogError> {
        self.index += 1;
        let path = shard_path(&self.dir, self.stream, self.index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogError::Open { path, source })?;
        self.encoder = GzEncoder::new(file, Compression::default());
        self.uncompressed_bytes = 0;
        Ok(())
    }
}

/// Scans every shard of one (job, stream) in order and returns the highest
/// `seq` belonging to a fully-written line, tolerating a truncated or
/// malformed trailing line left by a crash mid-write.
pub fn resume_last_seq(
    dir: &Path,
    job_id: joblet_core::JobId,
    stream: Stream,
) -> Result<Option<u64>, LogError> {
    let mut last_seq = None;
    for index in existing_shard_indices(dir, stream) {
        let path = shard_path(dir, stream, index);
        let file = File::open(&path).map_err(|source| LogError::Read { path: path.clone(), source })?;
        let reader = BufReader::new(MultiGzDecoder::new(file));
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let Ok(parsed) = serde_json::from_str::<PersistedLine>(&line) else { break };
            last_seq = Some(parsed.seq);
        }
    }
    Ok(last_seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(job_id: joblet_core::JobId, seq: u64) -> LogChunk {
        LogChunk { job_id, stream: Stream::Stdout, seq, ts_rfc3339: "2026-01-01T00:00:00Z".into(), bytes: b"hi\n".to_vec() }
    }

    #[test]
    fn writes_and_resumes_from_the_last_fully_written_line() {
        let dir = tempfile::tempdir().unwrap();
        let job_id = joblet_core::JobId::new();
        {
            let mut writer = ShardWriter::open(dir.path().to_path_buf(), job_id, Stream::Stdout).unwrap();
            for seq in 0..5 {
                writer.write_chunk(&chunk(job_id, seq)).unwrap();
            }
        }
        let resumed = resume_last_seq(dir.path(), job_id, Stream::Stdout).unwrap();
        assert_eq!(resumed, Some(4));
    }

    #[test]
    fn rotates_to_a_new_shard_past_the_byte_limit() {
        let dir = tempfile::tempdir().unwrap();
        let job_id = joblet_core::JobId::new();
        let mut writer = ShardWriter::open_with_limit(dir.path().to_path_buf(), job_id, Stream::Stdout, 16).unwrap();
        for seq in 0..10 {
            writer.write_chunk(&chunk(job_id, seq)).unwrap();
        }
        assert!(writer.index >= 1);
        let resumed = resume_last_seq(dir.path(), job_id, Stream::Stdout).unwrap();
        assert_eq!(resumed, Some(9));
    }

    #[test]
    fn no_shards_means_no_resume_point() {
        let dir = tempfile::tempdir().unwrap();
        let resumed = resume_last_seq(dir.path(), joblet_core::JobId::new(), Stream::Stdout).unwrap();
        assert_eq!(resumed, None);
    }
}
