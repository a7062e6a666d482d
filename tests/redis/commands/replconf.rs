use mirrorkv::commands::{CommandError, CommandResult};

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_replconf_command() {
    let env = TestEnv::new_master_server();
    let client_address = TestUtils::client_address(41844);

    let test_cases = vec![
        (
            TestUtils::replconf_command("listening-port", "6380"),
            CommandResult::RegisterReplica {
                listening_port: 6380,
                response: TestUtils::expected_simple_string("OK"),
            },
        ),
        (
            TestUtils::replconf_command("capa", "psync2"),
            CommandResult::Response(TestUtils::expected_simple_string("OK")),
        ),
        (
            TestUtils::invalid_command(&["REPLCONF", "capa", "eof", "capa", "psync2"]),
            CommandResult::Response(TestUtils::expected_simple_string("OK")),
        ),
    ];

    for (command, expected_result) in test_cases {
        let result = env.exec_command(command, &client_address).await;
        assert_eq!(result, Ok(expected_result));
    }

    // Registration is left to the connection, which owns the socket.
    let server_guard = env.server.read().await;
    assert!(server_guard.replicas.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn test_handle_replconf_command_invalid() {
    let env = TestEnv::new_master_server();

    let test_cases = vec![
        TestUtils::invalid_command(&["REPLCONF"]),
        TestUtils::invalid_command(&["REPLCONF", "listening-port"]),
        TestUtils::replconf_command("listening-port", "port"),
        TestUtils::replconf_command("listening-port", "70000"),
        TestUtils::replconf_command("getack", "*"),
    ];

    for command in test_cases {
        env.exec_command_immediate_error_response(
            command,
            &TestUtils::client_address(41844),
            CommandError::InvalidReplconfCommand,
        )
        .await;
    }
}

#[tokio::test]
async fn test_handle_replconf_command_on_replica() {
    let env = TestEnv::new_replica_server(6380);

    env.exec_command_immediate_error_response(
        TestUtils::replconf_command("listening-port", "6381"),
        &TestUtils::client_address(41844),
        CommandError::ReplicaReadOnlyCommands,
    )
    .await;
}
