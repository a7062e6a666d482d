//! Reading RESP data off network streams.
//!
//! Every connection owns a growing [`BytesMut`] read buffer. Reads append to
//! it and complete units are decoded off its front, so a command split across
//! two TCP reads is reassembled, and several commands arriving in one read are
//! all handled, in order.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::resp::{RespError, RespValue};

/// Upper bound on unparsed bytes held for one connection.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Errors that can occur while reading and parsing commands from network streams.
#[derive(Error, Debug, PartialEq)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
    #[error("request larger than {0} bytes")]
    BufferLimitExceeded(usize),
}

impl CommandReadError {
    pub fn as_string(&self) -> String {
        match self {
            CommandReadError::IoError(msg) => RespValue::Error(format!("ERR {}", msg)).encode(),
            CommandReadError::ConnectionClosed => {
                RespValue::Error("ERR connection closed".to_string()).encode()
            }
            CommandReadError::RespParseError(err) => err.as_string(),
            CommandReadError::BufferLimitExceeded(limit) => RespValue::Error(format!(
                "ERR Protocol error: request larger than {} bytes",
                limit
            ))
            .encode(),
        }
    }
}

/// Reads from `stream` until at least one complete RESP value is buffered and
/// returns every complete value available.
///
/// # Type Parameters
///
/// * `R` - Any type that implements AsyncReadExt and Unpin (typically a TcpStream)
///
/// # Returns
///
/// * `Ok(Vec<RespValue>)` - One or more values, in arrival order
/// * `Err(CommandReadError::IoError)` - If reading from the stream fails
/// * `Err(CommandReadError::ConnectionClosed)` - If the peer closed the connection
/// * `Err(CommandReadError::RespParseError)` - If the buffered bytes are malformed;
///   the buffer is discarded so the next call starts clean
/// * `Err(CommandReadError::BufferLimitExceeded)` - If an incomplete value grew past
///   [`MAX_BUFFER_SIZE`]
pub async fn read_and_parse_resp<R>(
    stream: &mut R,
    buffer: &mut BytesMut,
) -> Result<Vec<RespValue>, CommandReadError>
where
    R: AsyncReadExt + Unpin,
{
    loop {
        let values = drain_frames(buffer)?;

        if !values.is_empty() {
            return Ok(values);
        }

        fill_buffer(stream, buffer).await?;
    }
}

/// Reads exactly one RESP value, leaving anything after it in `buffer`.
pub async fn read_frame<R>(stream: &mut R, buffer: &mut BytesMut) -> Result<RespValue, CommandReadError>
where
    R: AsyncReadExt + Unpin,
{
    loop {
        if let Some(value) = RespValue::parse_frame(buffer)? {
            return Ok(value);
        }

        check_buffer_limit(buffer)?;
        fill_buffer(stream, buffer).await?;
    }
}

/// Reads the `$<len>\r\n<bytes>` snapshot block sent after `FULLRESYNC`.
///
/// A declared length over [`MAX_SNAPSHOT_SIZE`](crate::resp::MAX_SNAPSHOT_SIZE) fails with
/// [`RespError::SnapshotTooLarge`] before the payload is buffered.
pub async fn read_snapshot<R>(stream: &mut R, buffer: &mut BytesMut) -> Result<Bytes, CommandReadError>
where
    R: AsyncReadExt + Unpin,
{
    loop {
        if let Some(snapshot) = RespValue::parse_snapshot(buffer)? {
            return Ok(snapshot);
        }

        fill_buffer(stream, buffer).await?;
    }
}

fn drain_frames(buffer: &mut BytesMut) -> Result<Vec<RespValue>, CommandReadError> {
    let mut values = Vec::new();

    loop {
        match RespValue::parse_frame(buffer) {
            Ok(Some(value)) => values.push(value),
            Ok(None) => break,
            // Hand back what decoded cleanly first; the error surfaces on the next call.
            Err(_) if !values.is_empty() => break,
            Err(e) => {
                buffer.clear();
                return Err(e.into());
            }
        }
    }

    if values.is_empty() {
        check_buffer_limit(buffer)?;
    }

    Ok(values)
}

fn check_buffer_limit(buffer: &mut BytesMut) -> Result<(), CommandReadError> {
    if buffer.len() > MAX_BUFFER_SIZE {
        buffer.clear();
        return Err(CommandReadError::BufferLimitExceeded(MAX_BUFFER_SIZE));
    }

    Ok(())
}

async fn fill_buffer<R>(stream: &mut R, buffer: &mut BytesMut) -> Result<(), CommandReadError>
where
    R: AsyncReadExt + Unpin,
{
    let number_of_bytes = stream
        .read_buf(buffer)
        .await
        .map_err(|e| CommandReadError::IoError(e.to_string()))?;

    if number_of_bytes == 0 {
        return Err(CommandReadError::ConnectionClosed);
    }

    Ok(())
}
