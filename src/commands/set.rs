use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Represents the parsed arguments for SET command
pub struct SetArguments {
    /// The key name to store the value under
    key: String,
    /// The value to be stored under the given key
    value: String,
    /// Time to live, when a `PX` option was given
    ttl: Option<Duration>,
}

impl SetArguments {
    /// Parses command arguments into a SetArguments structure.
    ///
    /// # Arguments
    ///
    /// * `arguments` - A vector of strings representing the command arguments:
    ///   - Format 1: `[key, value]` - For permanent storage
    ///   - Format 2: `[key, value, "PX", milliseconds]` - For expiring storage
    ///
    /// # Returns
    ///
    /// * `Ok(SetArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidSetCommand)` - If the number of arguments is not 2 or 4
    /// * `Err(CommandError::InvalidSetCommandArgument)` - If the option is not "PX"
    /// * `Err(CommandError::InvalidSetCommandExpiration)` - If the milliseconds are not a
    ///   non-negative integer
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // SET with expiration (expires in 1000ms)
    /// let result = SetArguments::parse(vec![
    ///     "mykey".to_string(),
    ///     "hello".to_string(),
    ///     "PX".to_string(),
    ///     "1000".to_string()
    /// ]);
    /// // Returns: Ok(SetArguments { key: "mykey", value: "hello", ttl: Some(1s) })
    ///
    /// // Invalid expiration option
    /// let result = SetArguments::parse(vec![
    ///     "mykey".to_string(),
    ///     "hello".to_string(),
    ///     "EX".to_string(),  // Should be "PX"
    ///     "1000".to_string()
    /// ]);
    /// // Returns: Err(CommandError::InvalidSetCommandArgument)
    /// ```
    fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::InvalidSetCommand);
        }

        let mut arguments = arguments.into_iter();
        let (Some(key), Some(value)) = (arguments.next(), arguments.next()) else {
            return Err(CommandError::InvalidSetCommand);
        };

        let ttl = match (arguments.next(), arguments.next()) {
            (Some(option), Some(milliseconds)) => {
                if !option.eq_ignore_ascii_case("px") {
                    return Err(CommandError::InvalidSetCommandArgument);
                }

                let milliseconds = milliseconds
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidSetCommandExpiration)?;

                Some(Duration::from_millis(milliseconds))
            }
            _ => None,
        };

        Ok(Self { key, value, ttl })
    }
}

/// Handles the SET command.
///
/// Stores a key-value pair with an optional expiration of `now + PX milliseconds`.
/// A SET without `PX` clears any expiration the key had before.
///
/// Propagation to replicas is not done here; the caller decides whether the
/// command is a write to forward (see [`crate::commands::CommandHandler`]).
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - A RESP-encoded "OK" simple string on success
/// * `Err(CommandError)` - If the arguments do not parse, see [`SetArguments::parse`]
pub async fn set(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
    now: Instant,
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    match set_arguments.ttl {
        Some(ttl) => {
            store_guard.set_with_expiry(set_arguments.key, set_arguments.value, ttl, now)
        }
        None => store_guard.set(set_arguments.key, set_arguments.value),
    }

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
