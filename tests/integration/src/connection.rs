//! Integration tests for node connections against a fake node.

use vigil_failover::{ConnectionConfig, ConnectionError, NodeConnection, NodeError};
use vigil_protocol::{Command, Decoding, Frame};

use crate::helpers::{settle, test_connection_config, FakeNode, NodeOptions};

#[test]
fn ping_pong() {
    let node = FakeNode::primary();
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());

    let reply = conn.execute(&Command::Ping).unwrap();
    assert_eq!(reply, Frame::Simple("PONG".into()));
    assert_eq!(node.count("PING"), 1);
}

#[test]
fn info_replication_is_text() {
    let node = FakeNode::primary();
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());

    let reply = conn
        .execute(&Command::Info {
            section: Some("replication".into()),
        })
        .unwrap();
    let text = reply.as_str().unwrap();
    assert!(text.contains("role:master"), "got: {text}");
}

#[test]
fn auth_handshake() {
    let node = FakeNode::start_with(NodeOptions {
        password: Some("s3cret".into()),
        ..Default::default()
    });
    let config = ConnectionConfig {
        password: Some("s3cret".into()),
        db: 2,
        ..test_connection_config()
    };
    let mut conn = NodeConnection::new(node.addr(), config);
    conn.execute(&Command::Ping).unwrap();

    let names: Vec<String> = node.commands().into_iter().map(|c| c[0].clone()).collect();
    assert_eq!(names, vec!["AUTH", "SELECT", "PING"]);
}

#[test]
fn wrong_password_is_authentication_error() {
    let node = FakeNode::start_with(NodeOptions {
        password: Some("right".into()),
        ..Default::default()
    });
    let config = ConnectionConfig {
        password: Some("wrong".into()),
        ..test_connection_config()
    };
    let mut conn = NodeConnection::new(node.addr(), config);
    let err = conn.execute(&Command::Ping).unwrap_err();
    assert!(matches!(err, NodeError::Authentication(_)), "got: {err:?}");
    assert!(!conn.is_connected());
    assert_eq!(node.count("PING"), 0);
}

#[test]
fn bad_database_is_invalid_database() {
    let node = FakeNode::primary();
    let config = ConnectionConfig {
        db: 99,
        ..test_connection_config()
    };
    let mut conn = NodeConnection::new(node.addr(), config);
    let err = conn.connect().unwrap_err();
    assert!(matches!(
        err,
        NodeError::Connection(ConnectionError::InvalidDatabase { db: 99, .. })
    ));
}

#[test]
fn loading_node_invalidates_connection() {
    let node = FakeNode::start_with(NodeOptions {
        loading: true,
        ..Default::default()
    });
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());
    let err = conn.execute(&Command::Ping).unwrap_err();
    assert!(matches!(
        err,
        NodeError::Connection(ConnectionError::Loading(_))
    ));
    assert!(!conn.is_connected());
}

#[test]
fn unknown_command_keeps_connection() {
    let node = FakeNode::primary();
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());
    conn.send_frame(&Frame::command(&["FLY"])).unwrap();
    let err = conn.read_reply().unwrap_err();
    assert!(matches!(err, NodeError::Response(ref m) if m.contains("unknown command")));
    assert!(conn.is_connected());
    assert!(conn.execute(&Command::Ping).is_ok());
}

#[test]
fn large_reply_with_small_chunks() {
    let node = FakeNode::store();
    let value = "x".repeat(10_000);
    let config = ConnectionConfig {
        read_chunk_size: 64,
        decoding: Decoding::Raw,
        ..test_connection_config()
    };
    let mut conn = NodeConnection::new(node.addr(), config);
    conn.execute(&Command::Set {
        key: "big".into(),
        value: value.clone(),
    })
    .unwrap();

    let reply = conn.execute(&Command::Get { key: "big".into() }).unwrap();
    assert_eq!(reply.as_str(), Some(value.as_str()));
}

#[test]
fn killed_node_fails_and_stays_down() {
    let node = FakeNode::primary();
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());
    conn.execute(&Command::Ping).unwrap();

    node.kill();
    settle();

    let err = conn.execute(&Command::Ping).unwrap_err();
    assert!(err.is_connection_level(), "got: {err:?}");
    assert!(!conn.is_connected());

    // the next command reconnects, which is refused
    assert!(conn.execute(&Command::Ping).is_err());
}

#[test]
fn peer_close_visible_without_reading() {
    let node = FakeNode::primary();
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());
    conn.connect().unwrap();
    assert!(!conn.peer_closed());

    node.kill();
    settle();
    assert!(conn.peer_closed());
}
