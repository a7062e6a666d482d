use mirrorkv::commands::CommandError;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_echo_command() {
    let env = TestEnv::new_master_server();

    env.exec_command_immediate_success_response(
        TestUtils::echo_command("Hello, World!"),
        &TestUtils::client_address(41844),
        &TestUtils::expected_bulk_string("Hello, World!"),
    )
    .await;
}

#[tokio::test]
async fn test_handle_echo_command_on_replica() {
    let env = TestEnv::new_replica_server(6380);

    env.exec_command_immediate_success_response(
        TestUtils::echo_command("mango"),
        &TestUtils::client_address(41844),
        &TestUtils::expected_bulk_string("mango"),
    )
    .await;
}

#[tokio::test]
async fn test_handle_echo_command_invalid() {
    let env = TestEnv::new_master_server();

    let test_cases = vec![
        TestUtils::invalid_command(&["ECHO"]),
        TestUtils::invalid_command(&["ECHO", "grape", "mango"]),
    ];

    for command in test_cases {
        env.exec_command_immediate_error_response(
            command,
            &TestUtils::client_address(41844),
            CommandError::InvalidEchoCommand,
        )
        .await;
    }
}
