//! Bounded, thread-safe output buffer
//!
//! Each connector owns one [`OutputBuffer`]: a fixed-capacity ring of
//! timestamped lines. The connector's reader task appends; callers take
//! snapshots, page through recent lines, or follow a live tail.
//!
//! All operations are serialised behind a single non-reentrant mutex. Line
//! notifications are sent *after* the lock is released, so a subscriber may
//! call back into the buffer from its handler.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{ConnectorError, Result};

/// Default ring capacity in lines
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Broadcast channel capacity for line notifications
const LINE_CHANNEL_CAPACITY: usize = 256;

/// One captured line of agent output; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    /// Line text, without the trailing newline
    pub content: String,
    /// When the line was captured
    pub timestamp: DateTime<Utc>,
}

/// A line-appended notification
#[derive(Debug, Clone)]
pub struct LineEvent {
    /// Monotonic append sequence number, never reused after `clear`
    pub seq: u64,
    /// The appended line
    pub line: OutputLine,
}

struct BufferInner {
    lines: VecDeque<(u64, OutputLine)>,
    next_seq: u64,
}

/// Fixed-capacity ring buffer of output lines.
///
/// Once full, appending overwrites the oldest entry in O(1); FIFO order is
/// preserved.
pub struct OutputBuffer {
    capacity: usize,
    inner: Mutex<BufferInner>,
    line_tx: broadcast::Sender<LineEvent>,
}

impl OutputBuffer {
    /// Buffer with the default capacity of 10,000 lines
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Buffer with an explicit capacity (must be non-zero)
    ///
    /// # Panics
    /// Panics if `capacity` is zero; a zero-capacity ring is programmer error.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "OutputBuffer capacity must be non-zero");
        let (line_tx, _) = broadcast::channel(LINE_CHANNEL_CAPACITY);
        Self {
            capacity,
            inner: Mutex::new(BufferInner {
                lines: VecDeque::with_capacity(capacity),
                next_seq: 0,
            }),
            line_tx,
        }
    }

    /// Append a line, stamping it with the current UTC time.
    ///
    /// Evicts the oldest line when the ring is full. Subscribers are notified
    /// after the internal lock is released.
    pub fn append_line(&self, content: impl Into<String>) {
        let line = OutputLine {
            content: content.into(),
            timestamp: Utc::now(),
        };
        let event = {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            if inner.lines.len() == self.capacity {
                inner.lines.pop_front();
            }
            inner.lines.push_back((seq, line.clone()));
            LineEvent { seq, line }
        };
        let _ = self.line_tx.send(event);
    }

    /// The most recent `count` lines in chronological order (oldest of the
    /// window first)
    #[must_use]
    pub fn last_lines(&self, count: usize) -> Vec<OutputLine> {
        let inner = self.inner.lock();
        let skip = inner.lines.len().saturating_sub(count);
        inner
            .lines
            .iter()
            .skip(skip)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Snapshot of buffered line text, optionally filtered by a regex.
    ///
    /// The snapshot is taken under the lock; filtering happens after the lock
    /// is released. A malformed pattern is rejected, never treated as
    /// "matches nothing".
    ///
    /// # Errors
    /// Returns `InvalidFilter` when `pattern` fails to compile.
    pub fn lines(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let filter = compile_filter(pattern)?;
        let snapshot: Vec<OutputLine> = {
            let inner = self.inner.lock();
            inner.lines.iter().map(|(_, line)| line.clone()).collect()
        };
        Ok(snapshot
            .into_iter()
            .map(|line| line.content)
            .filter(|content| filter.as_ref().is_none_or(|re| re.is_match(content)))
            .collect())
    }

    /// Live tail: replay the current backlog, then yield lines as they are
    /// appended.
    ///
    /// The backlog snapshot and the subscription are taken atomically, so no
    /// line is duplicated or skipped at the boundary. A consumer that falls
    /// more than the notification channel capacity behind loses the oldest
    /// pending lines.
    ///
    /// # Errors
    /// Returns `InvalidFilter` when `pattern` fails to compile.
    pub fn stream_lines(&self, pattern: Option<&str>) -> Result<impl Stream<Item = String> + use<>> {
        let filter = compile_filter(pattern)?;
        let (backlog, last_seen, mut rx) = {
            let inner = self.inner.lock();
            let backlog: Vec<(u64, OutputLine)> = inner.lines.iter().cloned().collect();
            let last_seen = inner.next_seq;
            (backlog, last_seen, self.line_tx.subscribe())
        };

        Ok(async_stream::stream! {
            for (_, line) in backlog {
                if filter.as_ref().is_none_or(|re| re.is_match(&line.content)) {
                    yield line.content;
                }
            }
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        // Skip anything already replayed from the backlog.
                        if event.seq < last_seen {
                            continue;
                        }
                        if filter.as_ref().is_none_or(|re| re.is_match(&event.line.content)) {
                            yield event.line.content;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("output stream lagged, {missed} line(s) dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Subscribe to line-appended notifications. Dropping the receiver
    /// unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LineEvent> {
        self.line_tx.subscribe()
    }

    /// Remove all buffered lines
    pub fn clear(&self) {
        self.inner.lock().lines.clear();
    }

    /// Current number of stored lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }

    /// Whether the buffer holds no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured ring capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_filter(pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|e| ConnectorError::invalid_filter(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_keeps_last_n_in_order() {
        let buffer = OutputBuffer::with_capacity(3);
        for content in ["a", "b", "c", "d"] {
            buffer.append_line(content);
        }
        assert_eq!(buffer.len(), 3);
        let lines = buffer.lines(None).unwrap();
        assert_eq!(lines, vec!["b", "c", "d"]);
    }

    #[test]
    fn last_lines_is_chronological() {
        let buffer = OutputBuffer::with_capacity(3);
        for content in ["a", "b", "c", "d"] {
            buffer.append_line(content);
        }
        let last = buffer.last_lines(2);
        let contents: Vec<&str> = last.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "d"]);
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        let buffer = OutputBuffer::new();
        buffer.append_line("hello");
        let err = buffer.lines(Some("[unclosed")).unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidFilter(_)));
    }

    #[test]
    fn clear_empties_the_buffer() {
        let buffer = OutputBuffer::with_capacity(4);
        buffer.append_line("x");
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
