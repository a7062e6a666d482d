use mirrorkv::commands::CommandError;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_ping_command() {
    let env = TestEnv::new_master_server();

    let test_cases = vec![
        (TestUtils::ping_command(), TestUtils::expected_simple_string("PONG")),
        (
            TestUtils::invalid_command(&["ping"]),
            TestUtils::expected_simple_string("PONG"),
        ),
        (
            TestUtils::invalid_command(&["PING", "hello"]),
            TestUtils::expected_bulk_string("hello"),
        ),
    ];

    for (command, expected_response) in test_cases {
        env.exec_command_immediate_success_response(
            command,
            &TestUtils::client_address(41844),
            &expected_response,
        )
        .await;
    }
}

#[tokio::test]
async fn test_handle_ping_command_invalid() {
    let env = TestEnv::new_master_server();

    env.exec_command_immediate_error_response(
        TestUtils::invalid_command(&["PING", "hello", "there"]),
        &TestUtils::client_address(41844),
        CommandError::InvalidPingCommand,
    )
    .await;
}
