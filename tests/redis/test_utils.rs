use std::sync::Arc;

use mirrorkv::{
    commands::{CommandError, CommandHandler, CommandResult},
    config::MasterAddress,
    key_value_store::KeyValueStore,
    resp::RespValue,
    server::RedisServer,
};
use tokio::{
    net::{tcp::OwnedWriteHalf, TcpListener, TcpStream},
    sync::{Mutex, RwLock},
    time::Instant,
};

/// Test utilities for simplifying Redis command tests
pub struct TestUtils;

/// Test environment containing store and server
pub struct TestEnv {
    pub store: Arc<Mutex<KeyValueStore>>,
    pub server: Arc<RwLock<RedisServer>>,
}

/// Both ends of a loopback TCP connection, as a primary sees a connected replica.
pub struct TestConnection {
    /// Address of the connecting side, as the accepting side reports it
    pub client_address: String,
    /// Write half of the accepted side
    pub writer: Arc<RwLock<OwnedWriteHalf>>,
    /// The connecting side, used to read what was written to `writer`
    pub peer: TcpStream,
}

impl TestEnv {
    /// Create a new test environment with a master server
    pub fn new_master_server() -> Self {
        Self {
            store: Arc::new(Mutex::new(KeyValueStore::new())),
            server: Arc::new(RwLock::new(RedisServer::new(6379, None))),
        }
    }

    /// Create a new test environment with a replica server
    pub fn new_replica_server(replica_port: u16) -> Self {
        let master_address = MasterAddress {
            host: "127.0.0.1".to_string(),
            port: 6379,
        };

        Self {
            store: Arc::new(Mutex::new(KeyValueStore::new())),
            server: Arc::new(RwLock::new(RedisServer::new(
                replica_port,
                Some(master_address),
            ))),
        }
    }

    /// Open a loopback connection to stand in for a client or replica socket
    pub async fn new_client_connection() -> TestConnection {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let (peer, accepted) = tokio::join!(TcpStream::connect(address), listener.accept());
        let peer = peer.unwrap();
        let (accepted, client_address) = accepted.unwrap();
        let (_, writer) = accepted.into_split();

        TestConnection {
            client_address: client_address.to_string(),
            writer: Arc::new(RwLock::new(writer)),
            peer,
        }
    }

    /// Execute a command at the given instant, routed the way the server's role routes it
    pub async fn exec_command_at(
        &self,
        command: RespValue,
        client_address: &str,
        now: Instant,
    ) -> Result<CommandResult, CommandError> {
        let command_handler = CommandHandler::new(command)?;
        let is_master = self.server.read().await.is_master();

        if is_master {
            command_handler
                .handle_command_for_master_server(
                    Arc::clone(&self.server),
                    client_address,
                    Arc::clone(&self.store),
                    now,
                )
                .await
        } else {
            command_handler
                .handle_command_for_replica_server(
                    Arc::clone(&self.server),
                    client_address,
                    Arc::clone(&self.store),
                    now,
                )
                .await
        }
    }

    /// Execute a command and return the result
    pub async fn exec_command(
        &self,
        command: RespValue,
        client_address: &str,
    ) -> Result<CommandResult, CommandError> {
        self.exec_command_at(command, client_address, Instant::now())
            .await
    }

    /// Execute a command and assert it succeeds with expected result
    pub async fn exec_command_immediate_success_response(
        &self,
        command: RespValue,
        client_address: &str,
        expected_response: &str,
    ) {
        let result = self.exec_command(command, client_address).await;
        assert!(result.is_ok(), "unexpected error: {:?}", result);

        match result.unwrap() {
            CommandResult::Response(resp) | CommandResult::Sync(resp) => {
                assert_eq!(resp, expected_response.to_string());
            }
            CommandResult::RegisterReplica { response, .. } => {
                assert_eq!(response, expected_response.to_string());
            }
            CommandResult::NoResponse => panic!("Expected response, got no response"),
        }
    }

    /// Execute a command and assert it fails
    pub async fn exec_command_immediate_error_response(
        &self,
        command: RespValue,
        client_address: &str,
        expected_error: CommandError,
    ) {
        let result = self.exec_command(command, client_address).await;
        assert!(result.is_err(), "expected {:?}, got {:?}", expected_error, result);

        let command_error = result.unwrap_err();
        assert_eq!(command_error, expected_error);
    }

    /// Get a reference to the store for inspection
    pub async fn get_store(&self) -> tokio::sync::MutexGuard<'_, KeyValueStore> {
        self.store.lock().await
    }
}

impl TestUtils {
    /// Create a PING command
    pub fn ping_command() -> RespValue {
        RespValue::command(["PING"])
    }

    /// Create an ECHO command
    pub fn echo_command(message: &str) -> RespValue {
        RespValue::command(["ECHO", message])
    }

    /// Create a GET command
    pub fn get_command(key: &str) -> RespValue {
        RespValue::command(["GET", key])
    }

    /// Create a SET command
    pub fn set_command(key: &str, value: &str) -> RespValue {
        RespValue::command(["SET", key, value])
    }

    /// Create a SET command with expiration
    pub fn set_command_with_expiration(key: &str, value: &str, expiration_ms: u64) -> RespValue {
        RespValue::command([
            "SET".to_string(),
            key.to_string(),
            value.to_string(),
            "px".to_string(),
            expiration_ms.to_string(),
        ])
    }

    /// Create an INFO command
    pub fn info_command(section: Option<&str>) -> RespValue {
        match section {
            Some(section) => RespValue::command(["INFO", section]),
            None => RespValue::command(["INFO"]),
        }
    }

    /// Create a REPLCONF command
    pub fn replconf_command(key: &str, value: &str) -> RespValue {
        RespValue::command(["REPLCONF", key, value])
    }

    /// Create a PSYNC command
    pub fn psync_command(replication_id: &str, offset: &str) -> RespValue {
        RespValue::command(["PSYNC", replication_id, offset])
    }

    /// Create an arbitrary command out of bulk strings
    pub fn invalid_command(args: &[&str]) -> RespValue {
        RespValue::command(args.iter().copied())
    }

    /// Generate a unique client address for testing
    pub fn client_address(port: u16) -> String {
        format!("127.0.0.1:{}", port)
    }

    /// Create expected bulk string response
    pub fn expected_bulk_string(value: &str) -> String {
        format!("${}\r\n{}\r\n", value.len(), value)
    }

    /// Create expected simple string response
    pub fn expected_simple_string(value: &str) -> String {
        format!("+{}\r\n", value)
    }

    /// Create expected null response
    pub fn expected_null() -> String {
        "$-1\r\n".to_string()
    }

    /// Create expected error response
    pub fn expected_error(error: CommandError) -> String {
        error.as_string()
    }
}
