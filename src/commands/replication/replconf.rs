//! REPLCONF command implementation for replication configuration.
//!
//! REPLCONF is sent by a replica during the replication handshake to tell
//! the primary which port it listens on and which protocol capabilities it
//! understands.

use tracing::debug;

use crate::{
    commands::{command_handler::CommandResult, CommandError},
    resp::RespValue,
};

/// Represents the parsed arguments for the REPLCONF command.
///
/// Arguments come in `<option> <value>` pairs. Only `listening-port` and
/// `capa` are understood; `capa` may be repeated.
#[derive(Debug, PartialEq)]
pub struct ReplconfArguments {
    /// Port announced with `listening-port`, if present
    listening_port: Option<u16>,
    /// Values announced with `capa`
    capabilities: Vec<String>,
}

impl ReplconfArguments {
    /// Parses and validates arguments for the REPLCONF command.
    ///
    /// # Arguments
    ///
    /// * `arguments` - `<option> <value>` pairs, e.g. `["listening-port", "6380"]`
    ///
    /// # Returns
    ///
    /// * `Ok(ReplconfArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidReplconfCommand)` - If the arguments are not
    ///   pairs, an option is unknown, or the port is not a valid port number
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.is_empty() || arguments.len() % 2 != 0 {
            return Err(CommandError::InvalidReplconfCommand);
        }

        let mut listening_port = None;
        let mut capabilities = Vec::new();

        for pair in arguments.chunks(2) {
            let (option, value) = (&pair[0], &pair[1]);

            match option.to_lowercase().as_str() {
                "listening-port" => {
                    let port = value
                        .parse::<u16>()
                        .map_err(|_| CommandError::InvalidReplconfCommand)?;

                    listening_port = Some(port);
                }
                "capa" => capabilities.push(value.clone()),
                _ => return Err(CommandError::InvalidReplconfCommand),
            }
        }

        Ok(Self {
            listening_port,
            capabilities,
        })
    }
}

/// Handles the REPLCONF command on a primary.
///
/// Always acknowledges with `+OK`. When a `listening-port` is announced the
/// result asks the connection to register itself as a replica link; the
/// registration needs the connection's writer, which only the connection
/// handler holds.
///
/// # Examples
///
/// ```ignore
/// // REPLCONF listening-port 6380
/// let result = replconf(vec!["listening-port".to_string(), "6380".to_string()]);
/// // Returns: Ok(CommandResult::RegisterReplica { listening_port: 6380, response: "+OK\r\n" })
/// ```
pub fn replconf(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let replconf_arguments = ReplconfArguments::parse(arguments)?;
    let response = RespValue::SimpleString("OK".to_string()).encode();

    if !replconf_arguments.capabilities.is_empty() {
        debug!(capabilities = ?replconf_arguments.capabilities, "replica announced capabilities");
    }

    match replconf_arguments.listening_port {
        Some(listening_port) => Ok(CommandResult::RegisterReplica {
            listening_port,
            response,
        }),
        None => Ok(CommandResult::Response(response)),
    }
}
