//! Tests for the terminal connector over a Unix domain socket
//!
//! A `UnixListener` in a temp directory plays the agent endpoint: it echoes
//! received commands and pushes output lines of its own.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use orchestra_connector::connector::terminal::{validate_pipe_name, validate_socket_path};
use orchestra_connector::{
    ConnectionParams, ConnectionSettings, ConnectionStatus, Connector, ConnectorError,
    DisconnectReason, TerminalConnector,
};

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        connection_timeout_ms: 2_000,
        ..ConnectionSettings::default()
    }
    .validated()
    .unwrap()
}

/// Agent-side fixture: accepts one connection, sends `greeting`, then echoes
/// every received line prefixed with `echo: `.
fn spawn_fake_agent(listener: UnixListener, greeting: &'static str) {
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(format!("{greeting}\n").as_bytes())
            .await
            .unwrap();

        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = format!("echo: {line}\n");
            if write_half.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    });
}

async fn wait_for_output(connector: &TerminalConnector, needle: &str) -> bool {
    for _ in 0..100 {
        let lines = connector.read_output(None).unwrap();
        if lines.iter().any(|l| l.contains(needle)) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn connect_command_and_stream_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    spawn_fake_agent(listener, "ready");

    let mut connector = TerminalConnector::new(settings());
    let outcome = connector
        .connect("agent-1", &ConnectionParams::for_socket(&socket_path))
        .await
        .unwrap();
    assert!(outcome.success, "connect failed: {:?}", outcome.error);
    assert!(outcome.session_id.is_some());
    assert_eq!(connector.status(), ConnectionStatus::Connected);
    assert_eq!(connector.agent_id().as_deref(), Some("agent-1"));

    assert!(wait_for_output(&connector, "ready").await);

    let sent = connector.send_command("do the thing").await.unwrap();
    assert!(sent.success);
    assert!(wait_for_output(&connector, "echo: do the thing").await);

    let result = connector
        .disconnect(DisconnectReason::UserRequested)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(connector.status(), ConnectionStatus::Disconnected);
    assert!(connector.agent_id().is_none());
}

#[tokio::test]
async fn double_connect_is_a_precondition_error() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    spawn_fake_agent(listener, "hi");

    let mut connector = TerminalConnector::new(settings());
    let params = ConnectionParams::for_socket(&socket_path);
    assert!(connector.connect("agent-1", &params).await.unwrap().success);

    let err = connector.connect("agent-1", &params).await.unwrap_err();
    assert!(matches!(err, ConnectorError::AlreadyConnected(_)));

    connector
        .disconnect(DisconnectReason::UserRequested)
        .await
        .unwrap();
}

#[tokio::test]
async fn connector_is_reusable_after_clean_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");

    let mut connector = TerminalConnector::new(settings());
    let params = ConnectionParams::for_socket(&socket_path);

    for round in 0..2 {
        let listener = UnixListener::bind(&socket_path).unwrap();
        spawn_fake_agent(listener, "hello");
        let outcome = connector.connect("agent-1", &params).await.unwrap();
        assert!(outcome.success, "round {round}: {:?}", outcome.error);
        connector
            .disconnect(DisconnectReason::UserRequested)
            .await
            .unwrap();
        std::fs::remove_file(&socket_path).unwrap();
    }
}

#[tokio::test]
async fn connect_to_missing_endpoint_is_a_failure_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("nobody-home.sock");

    let mut connector = TerminalConnector::new(settings());
    let outcome = connector
        .connect("agent-1", &ConnectionParams::for_socket(&socket_path))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    assert_eq!(connector.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn invalid_socket_path_is_a_failure_outcome() {
    let mut connector = TerminalConnector::new(settings());
    let outcome = connector
        .connect(
            "agent-1",
            &ConnectionParams::for_socket("relative/path.sock"),
        )
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(connector.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn disconnect_when_disconnected_is_a_precondition_error() {
    let mut connector = TerminalConnector::new(settings());
    let err = connector
        .disconnect(DisconnectReason::UserRequested)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::NotConnected));
}

#[tokio::test]
async fn endpoint_eof_moves_status_to_disconnected() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    // Accept, say goodbye, and hang up immediately.
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        stream.write_all(b"bye\n").await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let mut connector = TerminalConnector::new(settings());
    let outcome = connector
        .connect("agent-1", &ConnectionParams::for_socket(&socket_path))
        .await
        .unwrap();
    assert!(outcome.success);

    let mut status_rx = connector.subscribe_status();
    let mut saw_disconnect = connector.status() == ConnectionStatus::Disconnected;
    while !saw_disconnect {
        match tokio::time::timeout(Duration::from_secs(2), status_rx.recv()).await {
            Ok(Ok(change)) => {
                saw_disconnect = change.new == ConnectionStatus::Disconnected;
            }
            _ => break,
        }
    }
    assert!(saw_disconnect, "expected EOF to move status to Disconnected");
    assert!(wait_for_output(&connector, "bye").await);
}

#[test]
fn validators_follow_the_endpoint_rules() {
    assert!(validate_pipe_name("orchestra_agent_pipe").is_ok());
    assert!(validate_pipe_name("").is_err());
    assert!(validate_pipe_name("bad\\name").is_err());
    assert!(validate_pipe_name(&"p".repeat(300)).is_err());

    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("ok.sock");
    assert!(validate_socket_path(&good).is_ok());
    assert!(validate_socket_path(&PathBuf::from("not/absolute.sock")).is_err());
    let long = dir.path().join(format!("{}.sock", "x".repeat(120)));
    assert!(validate_socket_path(&long).is_err());
    assert!(validate_socket_path(&dir.path().join("missing/child.sock")).is_err());
}

#[tokio::test]
async fn output_lines_carry_timestamps_and_refresh_activity() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("agent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    spawn_fake_agent(listener, "tick");

    let mut connector = TerminalConnector::new(settings());
    let before = connector.last_activity();
    connector
        .connect("agent-1", &ConnectionParams::for_socket(&socket_path))
        .await
        .unwrap();
    assert!(wait_for_output(&connector, "tick").await);

    let buffer = connector.buffer();
    let lines = buffer.last_lines(1);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].timestamp >= before);
    assert!(connector.last_activity() >= before);

    connector
        .disconnect(DisconnectReason::UserRequested)
        .await
        .unwrap();
}
