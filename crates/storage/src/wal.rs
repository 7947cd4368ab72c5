// SPDX-License-Identifier: MIT

//! Append-only write-ahead log backing the built-in state persister
//! (spec.md §4.7's external process, embedded here since standing up a
//! separate binary is out of scope). Shaped after the teacher's
//! `crates/storage` WAL: monotonic `seq`, `append`/`flush`, replay on
//! open to rebuild the in-memory table.

use crate::error::StorageError;
use crate::record::JobRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum WalOp {
    Upsert(JobRecord),
    Delete(joblet_core::JobId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    op: WalOp,
}

/// Append-only log plus the materialized `JobRecord` table derived by
/// replaying it. One file per node (`<state-root>/jobs.wal`).
pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
    table: HashMap<joblet_core::JobId, JobRecord>,
}

impl Wal {
    /// Opens (creating if absent) and replays every entry to rebuild the
    /// table. A malformed trailing line (partial write from a crash) ends
    /// replay at that point rather than erroring the whole open.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Wal { path: path.to_path_buf(), source })?;
        }
        let mut table = HashMap::new();
        let mut write_seq = 0u64;
        if path.exists() {
            let read_file =
                File::open(path).map_err(|source| StorageError::Wal { path: path.to_path_buf(), source })?;
            for line in BufReader::new(read_file).lines() {
                let Ok(line) = line else { break };
                if line.is_empty() {
                    continue;
                }
                let Ok(entry) = serde_json::from_str::<WalEntry>(&line) else { break };
                write_seq = entry.seq;
                match entry.op {
                    WalOp::Upsert(record) => {
                        table.insert(record.id, record);
                    }
                    WalOp::Delete(id) => {
                        table.remove(&id);
                    }
                }
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StorageError::Wal { path: path.to_path_buf(), source })?;
        Ok(Self { path: path.to_path_buf(), file, write_seq, table })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    fn append(&mut self, op: WalOp) -> Result<u64, StorageError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, op };
        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| StorageError::Corrupt { path: self.path.clone(), offset: self.write_seq, detail: e.to_string() })?;
        line.push(b'\n');
        self.file.write_all(&line).map_err(|source| StorageError::Wal { path: self.path.clone(), source })?;
        self.file.flush().map_err(|source| StorageError::Wal { path: self.path.clone(), source })?;
        Ok(self.write_seq)
    }

    /// spec.md §4.7 `upsert(job-record)`.
    pub fn upsert(&mut self, record: JobRecord) -> Result<(), StorageError> {
        self.table.insert(record.id, record.clone());
        self.append(WalOp::Upsert(record))?;
        Ok(())
    }

    /// spec.md §4.7 `delete(uuid)`.
    pub fn delete(&mut self, id: joblet_core::JobId) -> Result<(), StorageError> {
        self.table.remove(&id);
        self.append(WalOp::Delete(id))?;
        Ok(())
    }

    /// spec.md §4.7 `list-since(timestamp) → [job-records]`.
    pub fn list_since(&self, since_ms: u64) -> Vec<JobRecord> {
        self.table.values().filter(|r| r.updated_at_ms >= since_ms).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::{JobId, JobStatus, NodeId};

    fn record(id: joblet_core::JobId, updated_at_ms: u64) -> JobRecord {
        JobRecord {
            id,
            node_id: NodeId::new(),
            status: JobStatus::Running,
            command: "echo".into(),
            args: vec![],
            pid: 123,
            exit_code: None,
            started_at_ms: Some(updated_at_ms),
            ended_at_ms: None,
            failure_reason: None,
            updated_at_ms,
        }
    }

    #[test]
    fn upsert_then_list_since_returns_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Wal::open(&dir.path().join("jobs.wal")).unwrap();
        let id = JobId::new();
        wal.upsert(record(id, 1000)).unwrap();
        let listed = wal.list_since(0);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
    }

    #[test]
    fn delete_removes_from_subsequent_list_since() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Wal::open(&dir.path().join("jobs.wal")).unwrap();
        let id = JobId::new();
        wal.upsert(record(id, 1000)).unwrap();
        wal.delete(id).unwrap();
        assert!(wal.list_since(0).is_empty());
    }

    #[test]
    fn reopening_replays_prior_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.wal");
        let id = JobId::new();
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.upsert(record(id, 1000)).unwrap();
        }
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.write_seq(), 1);
        assert_eq!(wal.list_since(0).len(), 1);
    }

    #[test]
    fn list_since_filters_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Wal::open(&dir.path().join("jobs.wal")).unwrap();
        wal.upsert(record(JobId::new(), 1000)).unwrap();
        wal.upsert(record(JobId::new(), 2000)).unwrap();
        assert_eq!(wal.list_since(1500).len(), 1);
    }
}
