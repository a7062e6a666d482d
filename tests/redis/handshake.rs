use bytes::BytesMut;
use mirrorkv::{
    handshake::{handshake, HandshakeError, HandshakeStep},
    input::{read_frame, CommandReadError},
    resp::{RespError, RespValue},
    server::REPLICATION_ID,
};
use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

/// Answers each command it receives with the next scripted reply, then hangs up.
async fn fake_primary(mut stream: DuplexStream, replies: Vec<Vec<u8>>) -> Vec<RespValue> {
    let mut buffer = BytesMut::new();
    let mut received = Vec::new();

    for reply in replies {
        let Ok(command) = read_frame(&mut stream, &mut buffer).await else {
            break;
        };
        received.push(command);

        if stream.write_all(&reply).await.is_err() {
            break;
        }
    }

    received
}

fn fullresync_reply(trailing: &[u8]) -> Vec<u8> {
    let mut reply = format!("+FULLRESYNC {} 0\r\n", REPLICATION_ID).into_bytes();
    reply.extend_from_slice(&RespValue::encode_snapshot(b"REDIS0011-snapshot"));
    reply.extend_from_slice(trailing);
    reply
}

#[tokio::test]
async fn test_handshake_reaches_snapshot_received() {
    let (mut replica, primary) = duplex(64 * 1024);
    let set_command = RespValue::command(["SET", "grape", "mango"]);

    let primary = tokio::spawn(fake_primary(
        primary,
        vec![
            b"+PONG\r\n".to_vec(),
            b"+OK\r\n".to_vec(),
            b"+OK\r\n".to_vec(),
            fullresync_reply(set_command.encode().as_bytes()),
        ],
    ));

    let mut outcome = handshake(&mut replica, 6380).await.unwrap();

    assert_eq!(outcome.master_repl_id, REPLICATION_ID);
    assert_eq!(outcome.master_repl_offset, 0);
    assert_eq!(&outcome.snapshot[..], b"REDIS0011-snapshot");

    // Whatever followed the snapshot is still readable afterwards.
    let next = read_frame(&mut replica, &mut outcome.buffer).await.unwrap();
    assert_eq!(next, set_command);

    let received = primary.await.unwrap();
    assert_eq!(
        received,
        vec![
            RespValue::command(["PING"]),
            RespValue::command(["REPLCONF", "listening-port", "6380"]),
            RespValue::command(["REPLCONF", "capa", "psync2"]),
            RespValue::command(["PSYNC", "?", "-1"]),
        ]
    );
}

#[tokio::test]
async fn test_handshake_fails_on_unexpected_reply() {
    let test_cases = vec![
        (
            vec![b"+NOPE\r\n".to_vec()],
            HandshakeError::UnexpectedReply {
                step: HandshakeStep::PingSent,
                reply: RespValue::SimpleString("NOPE".to_string()),
            },
        ),
        (
            vec![b"+PONG\r\n".to_vec(), b"-ERR bad port\r\n".to_vec()],
            HandshakeError::UnexpectedReply {
                step: HandshakeStep::ReplconfPortSent,
                reply: RespValue::Error("ERR bad port".to_string()),
            },
        ),
        (
            vec![b"+PONG\r\n".to_vec(), b"+OK\r\n".to_vec(), b":1\r\n".to_vec()],
            HandshakeError::UnexpectedReply {
                step: HandshakeStep::ReplconfCapaSent,
                reply: RespValue::Integer(1),
            },
        ),
        (
            vec![
                b"+PONG\r\n".to_vec(),
                b"+OK\r\n".to_vec(),
                b"+OK\r\n".to_vec(),
                b"+CONTINUE\r\n".to_vec(),
            ],
            HandshakeError::InvalidFullResync("CONTINUE".to_string()),
        ),
        (
            vec![
                b"+PONG\r\n".to_vec(),
                b"+OK\r\n".to_vec(),
                b"+OK\r\n".to_vec(),
                b"+FULLRESYNC short-id 0\r\n".to_vec(),
            ],
            HandshakeError::InvalidFullResync("FULLRESYNC short-id 0".to_string()),
        ),
        (
            vec![
                b"+PONG\r\n".to_vec(),
                b"+OK\r\n".to_vec(),
                b"+OK\r\n".to_vec(),
                b"$5\r\nhello\r\n".to_vec(),
            ],
            HandshakeError::UnexpectedReply {
                step: HandshakeStep::PsyncSent,
                reply: RespValue::BulkString("hello".to_string()),
            },
        ),
    ];

    for (replies, expected_error) in test_cases {
        let (mut replica, primary) = duplex(64 * 1024);
        let primary = tokio::spawn(fake_primary(primary, replies));

        let result = handshake(&mut replica, 6380).await;
        assert_eq!(result.err(), Some(expected_error));

        drop(replica);
        primary.await.unwrap();
    }
}

#[tokio::test]
async fn test_handshake_fails_when_primary_hangs_up() {
    let (mut replica, primary) = duplex(64 * 1024);
    let primary = tokio::spawn(fake_primary(primary, vec![b"+PONG\r\n".to_vec()]));

    let result = handshake(&mut replica, 6380).await;

    assert!(
        matches!(
            result,
            Err(HandshakeError::Io {
                step: HandshakeStep::ReplconfPortSent,
                ..
            })
        ),
        "unexpected result: {:?}",
        result.err()
    );

    primary.await.unwrap();
}

#[tokio::test]
async fn test_handshake_rejects_oversized_snapshot() {
    let (mut replica, primary) = duplex(64 * 1024);

    let mut oversized = format!("+FULLRESYNC {} 0\r\n", REPLICATION_ID).into_bytes();
    oversized.extend_from_slice(b"$9999999999\r\nREDIS0011");

    let primary = tokio::spawn(fake_primary(
        primary,
        vec![
            b"+PONG\r\n".to_vec(),
            b"+OK\r\n".to_vec(),
            b"+OK\r\n".to_vec(),
            oversized,
        ],
    ));

    let result = handshake(&mut replica, 6380).await;

    assert_eq!(
        result.err(),
        Some(HandshakeError::Io {
            step: HandshakeStep::PsyncSent,
            source: CommandReadError::RespParseError(RespError::SnapshotTooLarge(9_999_999_999)),
        })
    );

    primary.await.unwrap();
}
