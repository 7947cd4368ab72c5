// SPDX-License-Identifier: MIT

//! Listener task for handling socket I/O (SPEC_FULL.md §6 "Unix domain
//! socket transport"): accepts connections and dispatches decoded
//! `Request`s to the [`EngineHandle`], without blocking the engine's own
//! message loop. One task per connection, same shape as the teacher's
//! `Listener::run_unix_only`/`handle_connection` split, minus the TCP +
//! auth-token path this spec has no use for.

use crate::engine::EngineHandle;
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::status::Stream;
use joblet_wire::wire::{read_request, write_response, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Listener {
    socket: UnixListener,
    engine: EngineHandle,
}

impl Listener {
    pub fn new(socket: UnixListener, engine: EngineHandle) -> Self {
        Self { socket, engine }
    }

    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, engine).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed on daemon socket"),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected before sending a full request");
        }
        _ => warn!(error = %e, "connection error"),
    }
}

/// Reads exactly one request, serves it (looping for the two streaming
/// kinds until `Response::Done`), and races the handler against client
/// disconnect so an abandoned stream subscription doesn't run forever.
async fn handle_connection<R, W>(mut reader: R, mut writer: W, engine: EngineHandle) -> Result<(), ProtocolError>
where
    R: AsyncRead + AsyncReadExt + Unpin + Send + 'static,
    W: AsyncWrite + AsyncWriteExt + Unpin + Send + 'static,
{
    let request = read_request(&mut reader).await?;
    info!(request = ?request, "received request");

    let cancel = CancellationToken::new();
    tokio::select! {
        result = serve(request, &engine, &mut writer, &cancel) => result,
        _ = detect_client_disconnect(&mut reader) => {
            cancel.cancel();
            debug!("client disconnected mid-stream");
            Ok(())
        }
    }
}

async fn detect_client_disconnect<R: AsyncReadExt + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

async fn serve<W>(
    request: Request,
    engine: &EngineHandle,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    match request {
        Request::StreamJobLogs { id } => stream_logs(engine, id, writer, cancel).await,
        Request::StreamJobMetrics { id } => stream_metrics(engine, id, writer, cancel).await,
        other => {
            let response = handle_unary(other, engine).await;
            write_response(writer, &response).await
        }
    }
}

async fn handle_unary(request: Request, engine: &EngineHandle) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Hello { client_version: _ } => Response::Hello { server_version: env!("CARGO_PKG_VERSION").to_string() },
        Request::RunJob { spec } => match engine.run_job(spec).await {
            Ok(id) => Response::JobAccepted { id },
            Err(e) => Response::error(e.code(), e.to_string()),
        },
        Request::StopJob { id } => match engine.stop_job(id).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error("NOT_FOUND", e.to_string()),
        },
        Request::GetJobStatus { id } => match engine.get_job_status(id).await {
            Ok(status) => Response::JobStatus { status },
            Err(e) => Response::error("NOT_FOUND", e.to_string()),
        },
        Request::ListJobs { filter } => Response::Jobs { jobs: engine.list_jobs(filter).await },
        Request::RunWorkflow { yaml, uploads } => match engine.run_workflow(yaml, uploads).await {
            Ok(id) => Response::WorkflowAccepted { id },
            Err(e) => Response::error(e.code(), e.to_string()),
        },
        Request::GetWorkflowStatus { id, detail } => match engine.get_workflow_status(id, detail).await {
            Ok(status) => Response::WorkflowStatus { status },
            Err(e) => Response::error("NOT_FOUND", e.to_string()),
        },
        Request::CreateNetwork { def } => match engine.create_network(def).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.code(), e.to_string()),
        },
        Request::ListNetworks => Response::Networks {
            networks: engine.list_networks().await.into_iter().map(|def| joblet_wire::status::NetworkView { def }).collect(),
        },
        Request::DeleteNetwork { name } => match engine.delete_network(name).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error("NOT_FOUND", e.to_string()),
        },
        Request::CreateVolume { def } => match engine.create_volume(def).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.code(), e.to_string()),
        },
        Request::ListVolumes => Response::Volumes {
            volumes: engine.list_volumes().await.into_iter().map(|def| joblet_wire::status::VolumeView { def }).collect(),
        },
        Request::DeleteVolume { name } => match engine.delete_volume(name).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error("NOT_FOUND", e.to_string()),
        },
        Request::ListRuntimes => Response::Runtimes { runtimes: engine.list_runtimes().await },
        Request::RegisterRuntime { def } => match engine.register_runtime(def).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.code(), e.to_string()),
        },
        Request::GetNodeInfo => Response::NodeInfo { info: engine.get_node_info().await },
        Request::StreamJobLogs { .. } | Request::StreamJobMetrics { .. } => {
            unreachable!("streaming requests are dispatched by serve(), not handle_unary()")
        }
    }
}

async fn stream_logs<W>(engine: &EngineHandle, id: joblet_core::JobId, writer: &mut W, cancel: &CancellationToken) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let subscription = match engine.stream_job_logs(id).await {
        Ok(sub) => sub,
        Err(e) => return write_response(writer, &Response::error("NOT_FOUND", e.to_string())).await,
    };
    for chunk in subscription.backlog {
        write_response(writer, &Response::LogChunk(chunk)).await?;
    }
    let mut stdout_rx = subscription.stdout_rx;
    let mut stderr_rx = subscription.stderr_rx;
    let mut stdout_open = true;
    let mut stderr_open = true;
    while stdout_open || stderr_open {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = stdout_rx.recv(), if stdout_open => match event {
                Some(event) => write_log_event(writer, Stream::Stdout, event).await?,
                None => stdout_open = false,
            },
            event = stderr_rx.recv(), if stderr_open => match event {
                Some(event) => write_log_event(writer, Stream::Stderr, event).await?,
                None => stderr_open = false,
            },
        }
    }
    write_response(writer, &Response::Done).await
}

async fn write_log_event<W>(writer: &mut W, _stream: Stream, event: joblet_logs::LogEvent) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    match event {
        joblet_logs::LogEvent::Chunk(chunk) => write_response(writer, &Response::LogChunk(chunk)).await,
        joblet_logs::LogEvent::Dropped(dropped) => write_response(writer, &Response::BackpressureDropped(dropped)).await,
    }
}

async fn stream_metrics<W>(engine: &EngineHandle, id: joblet_core::JobId, writer: &mut W, cancel: &CancellationToken) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut rx = match engine.stream_job_metrics(id).await {
        Ok(rx) => rx,
        Err(e) => return write_response(writer, &Response::error("NOT_FOUND", e.to_string())).await,
    };
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sample = rx.recv() => match sample {
                Some(sample) => write_response(writer, &Response::MetricSample(sample)).await?,
                None => return write_response(writer, &Response::Done).await,
            },
        }
    }
}
