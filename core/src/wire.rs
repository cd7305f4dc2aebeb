// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Wire codec
//!
//! JSON object framing on top of a plain `TcpStream`. Every message is
//! exactly one JSON object; frames are delimited with a 4-byte big-endian
//! length prefix so a single accepted connection can carry more than one
//! message (the listener's ack, then later the worker's real response —
//! see `Request::process`).
//!
//! This replaces the ZMTP REQ/REP socket semantics of the original with a
//! from-scratch framing, since this implementation does not depend on
//! ZeroMQ.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{CoreError, CoreResult};

/// Maximum frame size accepted from a peer. Guards against a buggy or
/// hostile peer claiming an unbounded length prefix.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Writes one JSON value as a length-prefixed frame.
pub async fn send_json(stream: &mut TcpStream, value: &serde_json::Value) -> CoreResult<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| CoreError::Transport(format!("failed to encode json frame: {e}")))?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| CoreError::Transport("json frame too large to send".into()))?;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    stream
        .write_all(&bytes)
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    Ok(())
}

/// Reads one length-prefixed JSON frame. Returns `Transport` if the
/// connection is closed or interrupted mid-frame.
pub async fn recv_json(stream: &mut TcpStream) -> CoreResult<serde_json::Value> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(CoreError::Transport(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_BYTES}-byte limit"
        )));
    }

    let mut body = vec![0u8; len as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;

    serde_json::from_slice(&body)
        .map_err(|e| CoreError::Transport(format!("malformed json frame: {e}")))
}
