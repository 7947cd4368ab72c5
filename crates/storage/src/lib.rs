// SPDX-License-Identifier: MIT

//! State Persister client (SP, spec.md §4.7): mirrors job state to an
//! external process (or, absent one, the embedded WAL in `wal.rs`) for
//! crash recovery. `upsert`/`delete` never block or fail the Lifecycle
//! Manager; `list_since` feeds LM's startup reconciliation.

pub mod client;
pub mod error;
pub mod record;
pub mod wal;

pub use client::{LocalWalClient, SocketClient, StateClient};
pub use error::StorageError;
pub use record::JobRecord;
pub use wal::Wal;
