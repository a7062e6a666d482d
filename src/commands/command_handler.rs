use std::sync::Arc;

use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::debug;

use crate::{
    commands::{
        command_error::CommandError,
        echo::echo,
        get::get,
        info::info,
        ping::ping,
        replication::{psync, replconf},
        set::set,
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
    server::{RedisServer, WRITE_COMMANDS},
};

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    NoResponse,
    Response(String),
    /// `REPLCONF listening-port`: the connection should be tracked as a replica link.
    RegisterReplica {
        listening_port: u16,
        response: String,
    },
    /// `+FULLRESYNC ...` line; the connection must follow it with the snapshot.
    Sync(String),
}

#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
    pub input: RespValue,
}

impl CommandHandler {
    pub fn new(input: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = &input else {
            return Err(CommandError::UnsupportedRespType);
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(s)) => s.to_uppercase(),
            _ => return Err(CommandError::InvalidCommand),
        };

        let mut arguments: Vec<String> = Vec::new();

        for element in &elements[1..] {
            let arg = match element {
                RespValue::BulkString(s) => Ok(s.to_string()),
                _ => Err(CommandError::InvalidCommandArgument),
            }?;

            arguments.push(arg);
        }

        Ok(Self {
            name,
            arguments,
            input,
        })
    }

    /// Turns one decoded request into the commands it carries.
    ///
    /// A request whose first element is itself an array is a batch: every
    /// element is collected in turn, so batches may nest.
    pub fn collect(input: RespValue) -> Result<Vec<Self>, CommandError> {
        match input {
            RespValue::Array(elements) if matches!(elements.first(), Some(RespValue::Array(_))) => {
                let mut handlers = Vec::new();

                for element in elements {
                    handlers.extend(Self::collect(element)?);
                }

                Ok(handlers)
            }
            input => Ok(vec![Self::new(input)?]),
        }
    }

    pub fn is_write_command(&self) -> bool {
        WRITE_COMMANDS.contains(&self.name.as_str())
    }

    async fn handle_command(
        &self,
        server: Arc<RwLock<RedisServer>>,
        store: Arc<Mutex<KeyValueStore>>,
        now: Instant,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "PING" => ping(self.arguments.clone()),
            "ECHO" => echo(self.arguments.clone()),
            "GET" => get(store, self.arguments.clone(), now).await,
            "SET" => set(store, self.arguments.clone(), now).await,
            "INFO" => info(server, self.arguments.clone()).await,
            "REPLCONF" => replconf(self.arguments.clone()),
            "PSYNC" => psync(server, self.arguments.clone()).await,
            _ => Err(CommandError::UnsupportedCommand(self.name.clone())),
        }
    }

    /// Runs a command received from a client of the primary.
    ///
    /// Writes hold the server lock while they are applied and handed to the
    /// replica links, so every replica sees them in the order the store did.
    /// The socket writes themselves happen on each link's own task.
    pub async fn handle_command_for_master_server(
        &self,
        server: Arc<RwLock<RedisServer>>,
        client_address: &str,
        store: Arc<Mutex<KeyValueStore>>,
        now: Instant,
    ) -> Result<CommandResult, CommandError> {
        debug!(client = client_address, command = %self.name, arguments = ?self.arguments, "handling command");

        if !self.is_write_command() {
            return self.handle_command(server, store, now).await;
        }

        let mut server_guard = server.write().await;

        let command_result = match self.name.as_str() {
            "SET" => set(store, self.arguments.clone(), now).await?,
            _ => return Err(CommandError::UnsupportedCommand(self.name.clone())),
        };

        if let Some(replicas) = &mut server_guard.replicas {
            replicas.queue(self.input.encode());
            replicas.propagate();
        }

        Ok(command_result)
    }

    /// Runs a command received from a client of a replica. Only reads are served.
    pub async fn handle_command_for_replica_server(
        &self,
        server: Arc<RwLock<RedisServer>>,
        client_address: &str,
        store: Arc<Mutex<KeyValueStore>>,
        now: Instant,
    ) -> Result<CommandResult, CommandError> {
        debug!(client = client_address, command = %self.name, arguments = ?self.arguments, "handling command");

        match self.name.as_str() {
            "REPLCONF" | "PSYNC" => Err(CommandError::ReplicaReadOnlyCommands),
            _ if self.is_write_command() => Err(CommandError::ReplicaReadOnlyCommands),
            _ => self.handle_command(server, store, now).await,
        }
    }

    /// Applies a command streamed from the primary. Nothing is ever sent back.
    pub async fn handle_command_for_replica_master_connection(
        &self,
        server: Arc<RwLock<RedisServer>>,
        master_address: &str,
        store: Arc<Mutex<KeyValueStore>>,
        now: Instant,
    ) -> Result<CommandResult, CommandError> {
        debug!(master = master_address, command = %self.name, arguments = ?self.arguments, "applying replicated command");

        self.handle_command(server, store, now).await?;

        Ok(CommandResult::NoResponse)
    }
}
