// SPDX-License-Identifier: MIT

//! Thin client over the daemon's Unix domain socket (SPEC_FULL.md §6):
//! one connection per request, matching the request/response(s) framing
//! `joblet-wire` defines. Streaming requests hand back an iterator-style
//! callback instead of a single `Response`.

use anyhow::{bail, Context, Result};
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::wire::{decode, encode, read_message, write_message};
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| format!("failed to connect to {}", self.socket_path.display()))
    }

    /// Sends a unary request and returns the single `Response`.
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect().await?;
        write_message(&mut stream, &encode(request)?).await?;
        let payload = read_message(&mut stream).await?;
        Ok(decode(&payload)?)
    }

    /// Sends a streaming request, invoking `on_response` for every frame
    /// up to and including the terminal `Done`/`Error` frame.
    pub async fn stream(&self, request: &Request, mut on_response: impl FnMut(Response) -> Result<()>) -> Result<()> {
        let mut stream = self.connect().await?;
        write_message(&mut stream, &encode(request)?).await?;
        loop {
            let payload = read_message(&mut stream).await?;
            let response: Response = decode(&payload)?;
            let terminal = response.is_terminal_frame();
            on_response(response)?;
            if terminal {
                return Ok(());
            }
        }
    }
}

/// Default socket path, overridable with the `JOBLET_SOCKET` env var
/// (mirrors `jobletd.toml`'s `socket_path` default).
pub fn default_socket_path() -> PathBuf {
    std::env::var("JOBLET_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new("/run/joblet/jobletd.sock").to_path_buf())
}

pub fn reject<T>(response: Response) -> Result<T> {
    match response {
        Response::Error { code, message } => bail!("{code}: {message}"),
        other => bail!("unexpected response from daemon: {other:?}"),
    }
}
