//! Connector lifecycle status and status-change notification

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle state of a connector.
///
/// Transitions: `Disconnected → Connecting → Connected → Disconnecting →
/// Disconnected`, with `Connected → Error` on IO failure and
/// `Error → Disconnecting` on disconnect. Nothing leaves `Disconnected`
/// except a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No channel open; the initial and terminal state
    Disconnected,
    /// Connect in progress
    Connecting,
    /// Channel open, reader task running
    Connected,
    /// Disconnect in progress
    Disconnecting,
    /// Channel failed; disconnect is still valid from here
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Why a disconnect happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Caller asked for the disconnect
    UserRequested,
    /// Disconnect triggered by a transport failure
    Error,
}

/// One status transition, broadcast to subscribers
#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Status before the transition
    pub old: ConnectionStatus,
    /// Status after the transition
    pub new: ConnectionStatus,
    /// When the transition happened
    pub at: DateTime<Utc>,
}

/// Broadcast channel capacity for status changes
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Shared status cell: serialises transitions and notifies subscribers.
///
/// The notification is sent after the internal lock is released, so a
/// subscriber may read the cell from its handler without deadlocking.
#[derive(Debug)]
pub struct StatusCell {
    current: parking_lot::Mutex<ConnectionStatus>,
    tx: broadcast::Sender<StatusChange>,
}

impl StatusCell {
    /// Create a cell in the `Disconnected` state
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            current: parking_lot::Mutex::new(ConnectionStatus::Disconnected),
            tx,
        }
    }

    /// Current status
    #[must_use]
    pub fn get(&self) -> ConnectionStatus {
        *self.current.lock()
    }

    /// Transition to `new`, broadcasting the change.
    ///
    /// A no-op when the status is unchanged; returns the previous status.
    pub fn set(&self, new: ConnectionStatus) -> ConnectionStatus {
        let old = {
            let mut guard = self.current.lock();
            let old = *guard;
            *guard = new;
            old
        };
        if old != new {
            // Send outside the lock; no receivers is fine.
            let _ = self.tx.send(StatusChange {
                old,
                new,
                at: Utc::now(),
            });
        }
        old
    }

    /// Subscribe to status transitions. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.tx.subscribe()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_broadcasts_old_and_new() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionStatus::Connecting);
        cell.set(ConnectionStatus::Connected);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.old, ConnectionStatus::Disconnected);
        assert_eq!(first.new, ConnectionStatus::Connecting);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.old, ConnectionStatus::Connecting);
        assert_eq!(second.new, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn same_status_is_not_broadcast() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionStatus::Disconnected);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
