use std::sync::Arc;

use anyhow::Context;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{Mutex, RwLock},
};
use tracing::{error, info};

use crate::{
    config::{Config, HandshakeFailurePolicy, MasterAddress},
    connection::{
        handle_master_to_client_connection, handle_master_to_replica_connection,
        handle_replica_to_client_connection,
    },
    handshake::{handshake, HandshakeOutcome},
    key_value_store::KeyValueStore,
    replication::Replicas,
};

pub const REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// Commands that change the store and are forwarded to replicas.
pub const WRITE_COMMANDS: [&str; 1] = ["SET"];

#[derive(Debug, Clone, PartialEq)]
pub enum RedisRole {
    Master,
    Replica(MasterAddress),
}

impl RedisRole {
    pub fn as_string(&self) -> &'static str {
        match self {
            RedisRole::Master => "master",
            RedisRole::Replica(_) => "slave",
        }
    }
}

#[derive(Debug)]
pub struct RedisServer {
    pub port: u16,
    pub role: RedisRole,
    pub repl_id: String,
    pub repl_offset: u64,
    /// Present only on a primary.
    pub replicas: Option<Replicas>,
}

impl RedisServer {
    pub fn new(port: u16, replicaof: Option<MasterAddress>) -> Self {
        let (role, replicas) = match replicaof {
            Some(master_address) => (RedisRole::Replica(master_address), None),
            None => (RedisRole::Master, Some(Replicas::new())),
        };

        RedisServer {
            port,
            role,
            repl_id: REPLICATION_ID.to_string(),
            repl_offset: 0,
            replicas,
        }
    }

    pub fn is_master(&self) -> bool {
        self.role == RedisRole::Master
    }

    /// Binds the configured address and serves until the process stops.
    pub async fn run(config: Config) -> anyhow::Result<()> {
        let address = format!("{}:{}", config.bind, config.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        Self::serve(config, listener).await
    }

    /// Serves connections accepted on `listener`.
    ///
    /// A replica first dials its primary and completes the handshake before
    /// accepting clients; the port it announces is the one `listener` is bound to.
    pub async fn serve(config: Config, listener: TcpListener) -> anyhow::Result<()> {
        let port = listener.local_addr()?.port();
        let server = RedisServer::new(port, config.replicaof.clone());
        let role = server.role.clone();

        let server = Arc::new(RwLock::new(server));
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        info!(port, role = role.as_string(), "server listening");

        if let RedisRole::Replica(master_address) = &role {
            match connect_to_master(master_address, port).await {
                Ok((stream, outcome)) => {
                    info!(
                        master = %master_address,
                        master_repl_id = %outcome.master_repl_id,
                        master_repl_offset = outcome.master_repl_offset,
                        "replication handshake completed"
                    );

                    tokio::spawn(handle_master_to_replica_connection(
                        master_address.to_string(),
                        stream,
                        outcome.buffer,
                        Arc::clone(&server),
                        Arc::clone(&store),
                    ));
                }
                Err(e) => match config.on_handshake_failure {
                    HandshakeFailurePolicy::Serve => {
                        error!(master = %master_address, "replication handshake failed, serving local data: {:#}", e);
                    }
                    HandshakeFailurePolicy::Abort => return Err(e),
                },
            }
        }

        loop {
            let (stream, address) = match listener.accept().await {
                Ok(connection) => connection,
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                    continue;
                }
            };

            let client_address = address.to_string();
            let server = Arc::clone(&server);
            let store = Arc::clone(&store);

            match role {
                RedisRole::Master => {
                    tokio::spawn(handle_master_to_client_connection(
                        stream,
                        server,
                        client_address,
                        store,
                    ));
                }
                RedisRole::Replica(_) => {
                    tokio::spawn(handle_replica_to_client_connection(
                        stream,
                        server,
                        client_address,
                        store,
                    ));
                }
            }
        }
    }
}

async fn connect_to_master(
    master_address: &MasterAddress,
    listening_port: u16,
) -> anyhow::Result<(TcpStream, HandshakeOutcome)> {
    let mut stream = TcpStream::connect(master_address.to_string())
        .await
        .with_context(|| format!("failed to connect to primary at {}", master_address))?;

    let outcome = handshake(&mut stream, listening_port)
        .await
        .with_context(|| format!("handshake with primary at {} failed", master_address))?;

    Ok((stream, outcome))
}
