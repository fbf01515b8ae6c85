//! Tests for the bounded output buffer

use futures::StreamExt;
use orchestra_connector::{ConnectorError, OutputBuffer};

#[test]
fn capacity_overflow_keeps_last_n_in_order() {
    let buffer = OutputBuffer::with_capacity(3);
    for content in ["a", "b", "c", "d"] {
        buffer.append_line(content);
    }

    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.lines(None).unwrap(), vec!["b", "c", "d"]);
    let last_two: Vec<String> = buffer
        .last_lines(2)
        .into_iter()
        .map(|l| l.content)
        .collect();
    assert_eq!(last_two, vec!["c", "d"]);
}

#[test]
fn round_trip_preserves_append_order() {
    let buffer = OutputBuffer::with_capacity(100);
    let lines: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
    for line in &lines {
        buffer.append_line(line.clone());
    }
    assert_eq!(buffer.lines(None).unwrap(), lines);
}

#[test]
fn pattern_filters_the_snapshot() {
    let buffer = OutputBuffer::new();
    buffer.append_line("error: disk full");
    buffer.append_line("info: all good");
    buffer.append_line("error: retrying");

    let errors = buffer.lines(Some("^error")).unwrap();
    assert_eq!(errors, vec!["error: disk full", "error: retrying"]);
}

#[test]
fn malformed_pattern_is_rejected() {
    let buffer = OutputBuffer::new();
    buffer.append_line("anything");
    assert!(matches!(
        buffer.lines(Some("(unclosed")),
        Err(ConnectorError::InvalidFilter(_))
    ));
    assert!(matches!(
        buffer.stream_lines(Some("(unclosed")).map(|_| ()),
        Err(ConnectorError::InvalidFilter(_))
    ));
}

#[test]
fn last_lines_larger_than_buffer_returns_everything() {
    let buffer = OutputBuffer::with_capacity(4);
    buffer.append_line("only");
    assert_eq!(buffer.last_lines(10).len(), 1);
}

#[test]
fn clear_resets_count() {
    let buffer = OutputBuffer::with_capacity(4);
    buffer.append_line("x");
    buffer.append_line("y");
    buffer.clear();
    assert_eq!(buffer.len(), 0);
    assert!(buffer.lines(None).unwrap().is_empty());
}

#[tokio::test]
async fn live_tail_replays_backlog_then_follows() {
    let _ = env_logger::builder().is_test(true).try_init();

    let buffer = std::sync::Arc::new(OutputBuffer::with_capacity(16));
    buffer.append_line("old-1");
    buffer.append_line("old-2");

    let mut stream = Box::pin(buffer.stream_lines(None).unwrap());
    assert_eq!(stream.next().await.unwrap(), "old-1");
    assert_eq!(stream.next().await.unwrap(), "old-2");

    let writer = std::sync::Arc::clone(&buffer);
    tokio::spawn(async move {
        writer.append_line("new-1");
    });
    assert_eq!(stream.next().await.unwrap(), "new-1");
}

#[tokio::test]
async fn line_events_fire_per_append() {
    let buffer = OutputBuffer::with_capacity(8);
    let mut rx = buffer.subscribe();

    buffer.append_line("hello");
    let event = rx.recv().await.unwrap();
    assert_eq!(event.line.content, "hello");
}

#[test]
fn concurrent_appends_never_exceed_capacity() {
    let buffer = std::sync::Arc::new(OutputBuffer::with_capacity(50));
    let mut handles = Vec::new();
    for t in 0..4 {
        let buffer = std::sync::Arc::clone(&buffer);
        handles.push(std::thread::spawn(move || {
            for i in 0..100 {
                buffer.append_line(format!("t{t}-{i}"));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(buffer.len(), 50);
}
