use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnsupportedCommand(String),
    #[error("unsupported RESP type for a command")]
    UnsupportedRespType,
    #[error("invalid command")]
    InvalidCommand,
    #[error("invalid command argument")]
    InvalidCommandArgument,
    #[error("invalid PING command")]
    InvalidPingCommand,
    #[error("invalid ECHO command")]
    InvalidEchoCommand,
    #[error("invalid GET command")]
    InvalidGetCommand,
    #[error("invalid SET command")]
    InvalidSetCommand,
    #[error("invalid SET command argument")]
    InvalidSetCommandArgument,
    #[error("invalid SET command expiration")]
    InvalidSetCommandExpiration,
    #[error("invalid INFO command")]
    InvalidInfoCommand,
    #[error("invalid INFO section")]
    InvalidInfoSection,
    #[error("invalid REPLCONF command")]
    InvalidReplconfCommand,
    #[error("invalid PSYNC command")]
    InvalidPsyncCommand,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("replica can only process read commands from clients")]
    ReplicaReadOnlyCommands,
}

impl CommandError {
    pub fn as_string(&self) -> String {
        let message = match self {
            CommandError::UnsupportedCommand(name) => format!("unknown command '{}'", name),
            CommandError::UnsupportedRespType => "Protocol error: expected an array of bulk strings".to_string(),
            CommandError::InvalidCommand => "Invalid command".to_string(),
            CommandError::InvalidCommandArgument => "Invalid command argument".to_string(),
            CommandError::InvalidPingCommand => "Invalid PING command".to_string(),
            CommandError::InvalidEchoCommand => "Invalid ECHO command".to_string(),
            CommandError::InvalidGetCommand => "Invalid GET command".to_string(),
            CommandError::InvalidSetCommand => "Invalid SET command".to_string(),
            CommandError::InvalidSetCommandArgument => "Invalid SET command argument".to_string(),
            CommandError::InvalidSetCommandExpiration => {
                "Invalid SET command expiration".to_string()
            }
            CommandError::InvalidInfoCommand => "Invalid INFO command".to_string(),
            CommandError::InvalidInfoSection => "Invalid INFO section".to_string(),
            CommandError::InvalidReplconfCommand => "Invalid REPLCONF command".to_string(),
            CommandError::InvalidPsyncCommand => "Invalid PSYNC command".to_string(),
            CommandError::InvalidPsyncOffset => "Invalid PSYNC offset".to_string(),
            CommandError::ReplicaReadOnlyCommands => {
                "replica can only process read commands from clients".to_string()
            }
        };

        RespValue::Error(format!("ERR {}", message)).encode()
    }
}
