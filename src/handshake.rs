//! Replica side of the replication handshake.
//!
//! The replica walks a fixed sequence over one connection to its primary:
//!
//! ```text
//! Disconnected -> PingSent -> ReplconfPortSent -> ReplconfCapaSent -> PsyncSent -> SnapshotReceived
//! ```
//!
//! Each step sends one command and waits for its reply. A reply that is not
//! the expected one fails the whole handshake, and the error names the step.
//! Once the snapshot is in, the same connection carries the primary's write
//! stream; see [`crate::connection::handle_master_to_replica_connection`].

use std::{fmt, sync::OnceLock};

use bytes::{Bytes, BytesMut};
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::{
    input::{read_frame, read_snapshot, CommandReadError},
    resp::RespValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Disconnected,
    PingSent,
    ReplconfPortSent,
    ReplconfCapaSent,
    PsyncSent,
    SnapshotReceived,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStep::Disconnected => "disconnected",
            HandshakeStep::PingSent => "PING",
            HandshakeStep::ReplconfPortSent => "REPLCONF listening-port",
            HandshakeStep::ReplconfCapaSent => "REPLCONF capa",
            HandshakeStep::PsyncSent => "PSYNC",
            HandshakeStep::SnapshotReceived => "snapshot received",
        };

        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum HandshakeError {
    #[error("connection failure after {step}: {source}")]
    Io {
        step: HandshakeStep,
        #[source]
        source: CommandReadError,
    },
    #[error("unexpected reply to {step}: {reply:?}")]
    UnexpectedReply { step: HandshakeStep, reply: RespValue },
    #[error("invalid FULLRESYNC reply \"{0}\"")]
    InvalidFullResync(String),
}

/// What the primary handed over during a successful handshake.
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub master_repl_id: String,
    pub master_repl_offset: i64,
    pub snapshot: Bytes,
    /// Bytes read past the snapshot; the start of the propagated write stream.
    pub buffer: BytesMut,
}

/// Performs the replication handshake between a replica and its primary.
///
/// # Arguments
///
/// * `stream` - Connection to the primary; stays usable for the write stream afterwards
/// * `listening_port` - Port this replica accepts clients on, announced via `REPLCONF`
///
/// # Protocol Details
///
/// - Primary must answer `PING` with `+PONG`
/// - Primary must answer both `REPLCONF` commands with `+OK`
/// - Primary must answer `PSYNC ? -1` with `+FULLRESYNC <replid> <offset>`
///   followed by a `$<len>\r\n<bytes>` snapshot block
pub async fn handshake<S>(stream: &mut S, listening_port: u16) -> Result<HandshakeOutcome, HandshakeError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    let mut buffer = BytesMut::with_capacity(4096);

    let step = HandshakeStep::PingSent;
    send_command(stream, step, RespValue::command(["PING"])).await?;
    expect_simple_string(stream, &mut buffer, step, "PONG").await?;

    let step = HandshakeStep::ReplconfPortSent;
    send_command(
        stream,
        step,
        RespValue::command([
            "REPLCONF".to_string(),
            "listening-port".to_string(),
            listening_port.to_string(),
        ]),
    )
    .await?;
    expect_simple_string(stream, &mut buffer, step, "OK").await?;

    let step = HandshakeStep::ReplconfCapaSent;
    send_command(stream, step, RespValue::command(["REPLCONF", "capa", "psync2"])).await?;
    expect_simple_string(stream, &mut buffer, step, "OK").await?;

    let step = HandshakeStep::PsyncSent;
    send_command(stream, step, RespValue::command(["PSYNC", "?", "-1"])).await?;

    let (master_repl_id, master_repl_offset) = match read_frame(stream, &mut buffer)
        .await
        .map_err(|source| HandshakeError::Io { step, source })?
    {
        RespValue::SimpleString(line) => parse_fullresync(&line)?,
        reply => return Err(HandshakeError::UnexpectedReply { step, reply }),
    };

    let snapshot = read_snapshot(stream, &mut buffer)
        .await
        .map_err(|source| HandshakeError::Io { step, source })?;

    debug!(
        step = %HandshakeStep::SnapshotReceived,
        snapshot_bytes = snapshot.len(),
        "handshake step completed"
    );

    Ok(HandshakeOutcome {
        master_repl_id,
        master_repl_offset,
        snapshot,
        buffer,
    })
}

async fn send_command<S>(stream: &mut S, step: HandshakeStep, command: RespValue) -> Result<(), HandshakeError>
where
    S: AsyncWriteExt + Unpin,
{
    let io_error = |e: std::io::Error| HandshakeError::Io {
        step,
        source: CommandReadError::IoError(e.to_string()),
    };

    stream
        .write_all(command.encode().as_bytes())
        .await
        .map_err(io_error)?;
    stream.flush().await.map_err(io_error)?;

    debug!(%step, "handshake command sent");
    Ok(())
}

async fn expect_simple_string<S>(
    stream: &mut S,
    buffer: &mut BytesMut,
    step: HandshakeStep,
    expected: &str,
) -> Result<(), HandshakeError>
where
    S: AsyncReadExt + Unpin,
{
    let reply = read_frame(stream, buffer)
        .await
        .map_err(|source| HandshakeError::Io { step, source })?;

    match reply {
        RespValue::SimpleString(ref text) if text.eq_ignore_ascii_case(expected) => Ok(()),
        reply => Err(HandshakeError::UnexpectedReply { step, reply }),
    }
}

fn parse_fullresync(line: &str) -> Result<(String, i64), HandshakeError> {
    let invalid = || HandshakeError::InvalidFullResync(line.to_string());

    let parts: Vec<&str> = line.split_whitespace().collect();

    let &[keyword, repl_id, offset] = parts.as_slice() else {
        return Err(invalid());
    };

    if keyword != "FULLRESYNC" || !is_valid_repl_id(repl_id) {
        return Err(invalid());
    }

    let offset = offset.parse::<i64>().map_err(|_| invalid())?;

    Ok((repl_id.to_string(), offset))
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    static REPL_ID: OnceLock<Regex> = OnceLock::new();

    REPL_ID
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9]{40}$").expect("replication id pattern compiles"))
        .is_match(repl_id)
}
