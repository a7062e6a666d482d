use std::sync::Arc;

use tokio::{sync::Mutex, time::Instant};

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Handles the GET command.
///
/// Looks `key` up as of `now`. A key whose expiration is earlier than `now`
/// is treated as missing and removed from the store.
///
/// # Arguments
///
/// * `store` - A thread-safe reference to the key-value store
/// * `arguments` - A vector containing exactly one string (the key to retrieve)
/// * `now` - The time the request was received
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - A RESP-encoded response:
///   - Bulk string containing the value if the key exists and hasn't expired
///   - Null bulk string (`$-1\r\n`) otherwise
/// * `Err(CommandError::InvalidGetCommand)` - If the number of arguments is not exactly 1
pub async fn get(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
    now: Instant,
) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::InvalidGetCommand);
    }

    let mut store_guard = store.lock().await;

    let response = match store_guard.get(&arguments[0], now) {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::Null,
    };

    Ok(CommandResult::Response(response.encode()))
}
