// SPDX-License-Identifier: MIT

//! State Persister client (SP, spec.md §4.7): `upsert`/`delete` are
//! fire-and-forget — failures are logged via tracing but never propagated
//! to the Lifecycle Manager, the same stance the teacher's `JobLogger`
//! takes on its own append failures. `list_since` is the one call LM
//! actually waits on, at startup, to reconstruct the job table.

use crate::error::StorageError;
use crate::record::JobRecord;
use crate::wal::Wal;
use async_trait::async_trait;
use joblet_core::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait StateClient: Send + Sync {
    async fn upsert(&self, record: JobRecord);
    async fn delete(&self, id: JobId);
    async fn list_since(&self, since_ms: u64) -> Result<Vec<JobRecord>, StorageError>;
}

/// Embedded backend: the WAL lives in this process rather than a separate
/// one (spec.md §4.7 describes a socket to an "external" process; standing
/// that process up is out of this workspace's scope, so this is the
/// default backend `jobletd` runs against).
pub struct LocalWalClient {
    wal: Arc<Mutex<Wal>>,
}

impl LocalWalClient {
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        Ok(Self { wal: Arc::new(Mutex::new(Wal::open(&path)?)) })
    }
}

#[async_trait]
impl StateClient for LocalWalClient {
    async fn upsert(&self, record: JobRecord) {
        let job_id = record.id;
        if let Err(e) = self.wal.lock().await.upsert(record) {
            warn!(job_id = %job_id, error = %e, "failed to persist job record");
        }
    }

    async fn delete(&self, id: JobId) {
        if let Err(e) = self.wal.lock().await.delete(id) {
            warn!(job_id = %id, error = %e, "failed to delete persisted job record");
        }
    }

    async fn list_since(&self, since_ms: u64) -> Result<Vec<JobRecord>, StorageError> {
        Ok(self.wal.lock().await.list_since(since_ms))
    }
}

/// Wire messages for the local-socket variant (spec.md §6 "IPC to state
/// persister. Local socket; length-prefixed messages.").
#[derive(Debug, Serialize, Deserialize)]
enum SpRequest {
    Upsert(JobRecord),
    Delete(JobId),
    ListSince(u64),
}

#[derive(Debug, Serialize, Deserialize)]
enum SpResponse {
    Ack,
    Records(Vec<JobRecord>),
}

/// Talks to an external state-persistence process over a Unix domain
/// socket. Each call opens a short-lived connection; `upsert`/`delete`
/// don't wait for the ack to come back.
pub struct SocketClient {
    socket_path: PathBuf,
}

impl SocketClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    async fn send(&self, request: &SpRequest) -> Result<SpResponse, StorageError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let payload = joblet_wire::encode(request)?;
        joblet_wire::write_message(&mut stream, &payload).await?;
        let response_bytes = joblet_wire::read_message(&mut stream).await?;
        Ok(joblet_wire::decode(&response_bytes)?)
    }
}

#[async_trait]
impl StateClient for SocketClient {
    async fn upsert(&self, record: JobRecord) {
        let job_id = record.id;
        if let Err(e) = self.send(&SpRequest::Upsert(record)).await {
            warn!(job_id = %job_id, error = %e, "fire-and-forget upsert to state persister failed");
        }
    }

    async fn delete(&self, id: JobId) {
        if let Err(e) = self.send(&SpRequest::Delete(id)).await {
            warn!(job_id = %id, error = %e, "fire-and-forget delete to state persister failed");
        }
    }

    async fn list_since(&self, since_ms: u64) -> Result<Vec<JobRecord>, StorageError> {
        match self.send(&SpRequest::ListSince(since_ms)).await? {
            SpResponse::Records(records) => Ok(records),
            SpResponse::Ack => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::{JobStatus, NodeId};

    fn record(id: JobId) -> JobRecord {
        JobRecord {
            id,
            node_id: NodeId::new(),
            status: JobStatus::Running,
            command: "echo".into(),
            args: vec![],
            pid: 1,
            exit_code: None,
            started_at_ms: Some(1),
            ended_at_ms: None,
            failure_reason: None,
            updated_at_ms: 1,
        }
    }

    #[tokio::test]
    async fn local_client_round_trips_through_upsert_and_list_since() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalWalClient::open(dir.path().join("jobs.wal")).unwrap();
        let id = JobId::new();
        client.upsert(record(id)).await;
        let listed = client.list_since(0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
    }

    #[tokio::test]
    async fn local_client_delete_removes_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalWalClient::open(dir.path().join("jobs.wal")).unwrap();
        let id = JobId::new();
        client.upsert(record(id)).await;
        client.delete(id).await;
        assert!(client.list_since(0).await.unwrap().is_empty());
    }
}
