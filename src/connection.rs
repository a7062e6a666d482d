use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::{
    net::TcpStream,
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::commands::{CommandError, CommandHandler, CommandResult};
use crate::rdb::rdb_file_block;
use crate::{
    input::{read_and_parse_resp, CommandReadError},
    key_value_store::KeyValueStore,
    server::RedisServer,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClientRole {
    Master,
    Replica,
}

pub async fn handle_master_to_client_connection(
    stream: TcpStream,
    server: Arc<RwLock<RedisServer>>,
    client_address: String,
    store: Arc<Mutex<KeyValueStore>>,
) {
    handle_client_connection(
        ClientRole::Master,
        stream,
        Arc::clone(&server),
        &client_address,
        store,
    )
    .await;

    let mut server_guard = server.write().await;

    if let Some(replicas) = &mut server_guard.replicas {
        if replicas.remove(&client_address).is_some() {
            info!(replica = %client_address, "replica disconnected");
        }
    }
}

pub async fn handle_replica_to_client_connection(
    stream: TcpStream,
    server: Arc<RwLock<RedisServer>>,
    client_address: String,
    store: Arc<Mutex<KeyValueStore>>,
) {
    handle_client_connection(ClientRole::Replica, stream, server, &client_address, store).await;
}

/// Applies the write stream sent by the primary after the handshake.
///
/// `buffer` holds whatever the handshake read past the snapshot block.
pub async fn handle_master_to_replica_connection(
    master_address: String,
    mut stream: TcpStream,
    mut buffer: BytesMut,
    server: Arc<RwLock<RedisServer>>,
    store: Arc<Mutex<KeyValueStore>>,
) {
    loop {
        let parsed_input = match read_and_parse_resp(&mut stream, &mut buffer).await {
            Ok(values) => values,
            Err(CommandReadError::ConnectionClosed) => {
                warn!(master = %master_address, "primary closed the replication link");
                break;
            }
            Err(e @ CommandReadError::IoError(_)) => {
                error!(master = %master_address, "replication link failed: {}", e);
                break;
            }
            Err(e) => {
                warn!(master = %master_address, "dropping malformed replication input: {}", e);
                continue;
            }
        };

        let now = Instant::now();

        for input in parsed_input {
            let command_handlers = match CommandHandler::collect(input) {
                Ok(handlers) => handlers,
                Err(e) => {
                    warn!(master = %master_address, "ignoring replicated request: {}", e);
                    continue;
                }
            };

            for command_handler in command_handlers {
                if let Err(e) = command_handler
                    .handle_command_for_replica_master_connection(
                        Arc::clone(&server),
                        &master_address,
                        Arc::clone(&store),
                        now,
                    )
                    .await
                {
                    warn!(master = %master_address, command = %command_handler.name, "replicated command failed: {}", e);
                }
            }
        }
    }
}

async fn handle_client_connection(
    client_role: ClientRole,
    stream: TcpStream,
    server: Arc<RwLock<RedisServer>>,
    client_address: &str,
    store: Arc<Mutex<KeyValueStore>>,
) {
    let mut buffer = BytesMut::with_capacity(4096);

    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(RwLock::new(writer));

    debug!(client = client_address, "client connected");

    loop {
        let parsed_input = match read_and_parse_resp(&mut reader, &mut buffer).await {
            Ok(values) => values,
            Err(CommandReadError::ConnectionClosed) => {
                debug!(client = client_address, "client disconnected");
                break;
            }
            Err(e @ CommandReadError::IoError(_)) => {
                warn!(client = client_address, "closing connection: {}", e);
                break;
            }
            Err(e) => {
                warn!(client = client_address, "protocol error: {}", e);

                if let Err(e) =
                    thread_safe_write_to_stream(Arc::clone(&writer), e.as_string().as_bytes()).await
                {
                    warn!(client = client_address, "error writing to stream: {}", e);
                    break;
                }
                continue;
            }
        };

        let now = Instant::now();

        for input in parsed_input {
            let command_handlers = match CommandHandler::collect(input) {
                Ok(handlers) => handlers,
                Err(e) => {
                    if let Err(e) =
                        thread_safe_write_to_stream(Arc::clone(&writer), e.as_string().as_bytes())
                            .await
                    {
                        warn!(client = client_address, "error writing to stream: {}", e);
                        return;
                    }
                    continue;
                }
            };

            for command_handler in command_handlers {
                let command_result = match client_role {
                    ClientRole::Master => {
                        command_handler
                            .handle_command_for_master_server(
                                Arc::clone(&server),
                                client_address,
                                Arc::clone(&store),
                                now,
                            )
                            .await
                    }
                    ClientRole::Replica => {
                        command_handler
                            .handle_command_for_replica_server(
                                Arc::clone(&server),
                                client_address,
                                Arc::clone(&store),
                                now,
                            )
                            .await
                    }
                };

                if let Err(e) = write_command_result(
                    command_result,
                    Arc::clone(&server),
                    client_address,
                    Arc::clone(&writer),
                )
                .await
                {
                    warn!(client = client_address, "error writing to stream: {}", e);
                    return;
                }
            }
        }
    }
}

async fn write_command_result(
    command_result: Result<CommandResult, CommandError>,
    server: Arc<RwLock<RedisServer>>,
    client_address: &str,
    writer: Arc<RwLock<OwnedWriteHalf>>,
) -> tokio::io::Result<()> {
    let command_result = match command_result {
        Ok(result) => result,
        Err(e) => return thread_safe_write_to_stream(writer, e.as_string().as_bytes()).await,
    };

    match command_result {
        CommandResult::NoResponse => Ok(()),
        CommandResult::Response(response) => {
            thread_safe_write_to_stream(writer, response.as_bytes()).await
        }
        CommandResult::RegisterReplica {
            listening_port,
            response,
        } => {
            {
                let mut server_guard = server.write().await;

                if let Some(replicas) = &mut server_guard.replicas {
                    replicas.register(client_address, listening_port, Arc::clone(&writer));
                    info!(replica = client_address, listening_port, "replica registered");
                }
            }

            thread_safe_write_to_stream(writer, response.as_bytes()).await
        }
        CommandResult::Sync(response) => {
            let mut resync = response.into_bytes();
            resync.extend_from_slice(&rdb_file_block()?);

            let mut server_guard = server.write().await;

            // The link's writer task sends the snapshot before any later write.
            if let Some(replicas) = &mut server_guard.replicas {
                replicas.start_full_resync(client_address, writer, Bytes::from(resync));
                info!(replica = client_address, "replica synced");
                return Ok(());
            }

            drop(server_guard);
            thread_safe_write_to_stream(writer, &resync).await
        }
    }
}

async fn thread_safe_write_to_stream(
    writer: Arc<RwLock<OwnedWriteHalf>>,
    response: &[u8],
) -> tokio::io::Result<()> {
    let mut writer_guard = writer.write().await;
    writer_guard.write_all(response).await?;
    writer_guard.flush().await?;

    Ok(())
}
