//! Tests for the in-memory stores and subprocess session resume preconditions

use std::sync::Arc;

use chrono::Utc;

use orchestra_connector::{
    ConnectorError, InMemorySessionStore, SessionRecord, SessionRecordStatus, SessionStore,
    SubprocessConnector,
};

fn record(session_id: &str, status: SessionRecordStatus) -> SessionRecord {
    let now = Utc::now();
    SessionRecord {
        session_id: session_id.to_string(),
        agent_id: "agent-1".to_string(),
        working_dir: None,
        status,
        process_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn session_record_round_trip() -> anyhow::Result<()> {
    let store = InMemorySessionStore::new();
    store
        .create_record(record("s-1", SessionRecordStatus::Active))
        .await?;

    let loaded = store.record("s-1").await?.expect("record should exist");
    assert_eq!(loaded.status, SessionRecordStatus::Active);
    assert_eq!(loaded.agent_id, "agent-1");

    store
        .update_status("s-1", SessionRecordStatus::Paused, Some(4242))
        .await?;
    let loaded = store.record("s-1").await?.expect("record should exist");
    assert_eq!(loaded.status, SessionRecordStatus::Paused);
    assert_eq!(loaded.process_id, Some(4242));
    assert!(loaded.updated_at >= loaded.created_at);
    Ok(())
}

#[tokio::test]
async fn updating_an_unknown_record_is_an_error() {
    let store = InMemorySessionStore::new();
    let err = store
        .update_status("ghost", SessionRecordStatus::Paused, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::RecordNotFound(_)));
}

#[tokio::test]
async fn missing_record_loads_as_none() -> anyhow::Result<()> {
    let store = InMemorySessionStore::new();
    assert!(store.record("nope").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn resume_without_a_store_is_a_config_error() {
    let mut connector = SubprocessConnector::new();
    let err = connector.resume_session("s-1").await.unwrap_err();
    assert!(matches!(err, ConnectorError::InvalidConfig(_)));
}

#[tokio::test]
async fn resume_of_an_unknown_session_is_a_failure_outcome() {
    let store = InMemorySessionStore::shared();
    let mut connector = SubprocessConnector::with_buffer(
        Arc::new(orchestra_connector::OutputBuffer::new()),
        Some(store),
    );

    let outcome = connector.resume_session("ghost").await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn resume_of_a_closed_session_is_a_failure_outcome() {
    let store = InMemorySessionStore::shared();
    store
        .create_record(record("s-1", SessionRecordStatus::Closed))
        .await
        .unwrap();

    let mut connector = SubprocessConnector::with_buffer(
        Arc::new(orchestra_connector::OutputBuffer::new()),
        Some(store),
    );
    let outcome = connector.resume_session("s-1").await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("closed"));
}
