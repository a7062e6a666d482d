use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

/// Handles the ECHO command.
///
/// Returns the exact string provided as an argument, as a bulk string.
///
/// # Arguments
///
/// * `arguments` - A vector containing exactly one string argument to echo back
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - A RESP-encoded bulk string containing the argument
/// * `Err(CommandError::InvalidEchoCommand)` - If the number of arguments is not exactly 1
pub fn echo(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let [message] = <[String; 1]>::try_from(arguments).map_err(|_| CommandError::InvalidEchoCommand)?;

    Ok(CommandResult::Response(
        RespValue::BulkString(message).encode(),
    ))
}
