//! Command line configuration.

use std::{fmt, str::FromStr};

use clap::{error::ErrorKind, Parser, ValueEnum};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
    #[error("{0}")]
    Other(String),
}

/// Address of the primary a replica follows, given as `"<host> <port>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for MasterAddress {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input.split_whitespace().collect();

        let [host, port] = parts.as_slice() else {
            return Err(format!("expected \"<host> <port>\", got \"{}\"", input));
        };

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| format!("invalid primary port \"{}\"", port))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for MasterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What a replica does when it cannot complete the handshake with its primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HandshakeFailurePolicy {
    /// Log the failure and keep serving clients from the local store.
    #[default]
    Serve,
    /// Stop the server with the handshake error.
    Abort,
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "mirrorkv")]
#[command(about = "In-memory key-value server with primary/replica replication")]
pub struct Config {
    /// Port to accept client and replica connections on
    #[arg(long, default_value_t = 6379, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Host or IP address the listener binds to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Run as a replica of the given primary, e.g. "localhost 6379"
    #[arg(long)]
    pub replicaof: Option<MasterAddress>,

    /// Behaviour when the replication handshake fails
    #[arg(long, value_enum, default_value_t = HandshakeFailurePolicy::Serve)]
    pub on_handshake_failure: HandshakeFailurePolicy,
}

impl Config {
    /// Parses a full argument list, program name included.
    pub fn from_args<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        Config::try_parse_from(command_line_args).map_err(|e| match e.kind() {
            ErrorKind::UnknownArgument => CliError::InvalidCommandLineFlag,
            ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
                CliError::InvalidCommandLineFlagValue
            }
            _ => CliError::Other(e.to_string()),
        })
    }
}
