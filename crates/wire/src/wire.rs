// SPDX-License-Identifier: MIT

//! Length-prefixed JSON framing over a Unix domain socket (SPEC_FULL.md §6):
//! a 4-byte big-endian length prefix followed by a `serde_json`-encoded
//! payload. One request, one or more streamed responses, terminated by a
//! `Response::Done` frame.

use crate::request::Request;
use crate::response::Response;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard cap on a single frame's payload size — guards against a corrupt or
/// hostile length prefix causing an unbounded allocation.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json encode/decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

/// Encode a value as raw JSON bytes (no length prefix).
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a value from raw JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write `payload` prefixed with its big-endian `u32` length.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge { len: payload.len(), max: MAX_FRAME_BYTES });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed payload, or `Ok(None)` on clean EOF before any
/// bytes of a new frame arrive (the connection was closed between frames).
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge { len, max: MAX_FRAME_BYTES });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Read one length-prefixed `Request` frame.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Request, ProtocolError> {
    let payload = read_message(reader).await?;
    decode(&payload)
}

/// Write one length-prefixed `Response` frame.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let payload = encode(response)?;
    write_message(writer, &payload).await
}
