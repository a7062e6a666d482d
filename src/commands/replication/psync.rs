//! PSYNC command implementation for replication synchronization.
//!
//! Only full resynchronization exists: whatever replication ID and offset
//! the replica asks for, the primary answers `FULLRESYNC` and ships a
//! snapshot.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    commands::{command_handler::CommandResult, CommandError},
    resp::RespValue,
    server::RedisServer,
};

/// Represents the parsed arguments for the PSYNC command.
pub struct PsyncArguments {
    /// The replication ID the replica last followed (or "?" for none)
    master_repl_id: String,
    /// The replica's replication offset (or -1 for none)
    offset: i64,
}

impl PsyncArguments {
    /// Parses and validates arguments for the PSYNC command.
    ///
    /// # Returns
    ///
    /// * `Ok(PsyncArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidPsyncCommand)` - If not exactly 2 arguments
    /// * `Err(CommandError::InvalidPsyncOffset)` - If offset is not a valid integer
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        let [master_repl_id, offset] =
            <[String; 2]>::try_from(arguments).map_err(|_| CommandError::InvalidPsyncCommand)?;

        let offset = offset
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(Self {
            master_repl_id,
            offset,
        })
    }
}

/// Handles the PSYNC command.
///
/// # Returns
///
/// * `Ok(CommandResult::Sync)` - `+FULLRESYNC <repl_id> <offset>\r\n`; the
///   connection handler follows it with the snapshot block
/// * `Err(CommandError::InvalidPsyncCommand)` - If argument parsing fails
/// * `Err(CommandError::InvalidPsyncOffset)` - If offset is invalid
/// * `Err(CommandError::ReplicaReadOnlyCommands)` - If this server is itself a replica
pub async fn psync(
    server: Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    let server_guard = server.read().await;

    if !server_guard.is_master() {
        return Err(CommandError::ReplicaReadOnlyCommands);
    }

    tracing::debug!(
        requested_repl_id = %psync_arguments.master_repl_id,
        requested_offset = psync_arguments.offset,
        "full resync requested"
    );

    Ok(CommandResult::Sync(
        RespValue::SimpleString(format!(
            "FULLRESYNC {} {}",
            server_guard.repl_id, server_guard.repl_offset
        ))
        .encode(),
    ))
}
