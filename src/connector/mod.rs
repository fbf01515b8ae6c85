//! Connector abstraction over agent IPC transports
//!
//! A connector owns exactly one live channel to one agent process plus the
//! background task that drains its output into the session's
//! [`OutputBuffer`](crate::buffer::OutputBuffer). Two implementations exist:
//! [`TerminalConnector`] attaches to an existing terminal endpoint over a
//! Unix domain socket (or a named pipe on Windows), and
//! [`SubprocessConnector`] spawns the agent CLI headless with piped stdio.

pub mod subprocess;
pub mod terminal;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::broadcast;

use crate::buffer::OutputBuffer;
use crate::error::Result;
use crate::types::{
    CommandOutcome, ConnectionOutcome, ConnectionParams, ConnectionStatus, DisconnectOutcome,
    DisconnectReason, StatusChange,
};

/// Boxed live-tail output stream
pub type OutputStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// How long a disconnect waits for the reader task / child process before
/// giving up (the timeout is logged, not fatal)
pub const DISCONNECT_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// One active transport to one agent.
///
/// State machine: `Disconnected → Connecting → Connected → Disconnecting →
/// Disconnected`, with `Connected → Error` on IO failure. A connector is
/// reusable after a clean disconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open the channel to the agent and start the output-reader task.
    ///
    /// Validation failures and transport failures are returned as a failure
    /// [`ConnectionOutcome`], with partially created resources torn down.
    ///
    /// # Errors
    /// `AlreadyConnected` when the connector is not `Disconnected`; calling
    /// connect twice is API misuse, not a transport failure.
    async fn connect(
        &mut self,
        agent_id: &str,
        params: &ConnectionParams,
    ) -> Result<ConnectionOutcome>;

    /// Write `command` plus a newline as UTF-8 to the open channel and flush.
    ///
    /// An IO error yields a failure outcome and moves the status to `Error`;
    /// a channel that is already gone yields a failure outcome and moves the
    /// status to `Disconnected`. Concurrent sends on one connector are not
    /// internally serialised; callers needing strict ordering must not
    /// overlap commands.
    ///
    /// # Errors
    /// `NotConnected` when no channel has been opened.
    async fn send_command(&mut self, command: &str) -> Result<CommandOutcome>;

    /// Snapshot of currently buffered output, optionally filtered by a regex.
    ///
    /// # Errors
    /// `InvalidFilter` when the pattern fails to compile.
    fn read_output(&self, filter: Option<&str>) -> Result<Vec<String>>;

    /// Live tail: the buffered backlog followed by newly captured lines.
    ///
    /// # Errors
    /// `InvalidFilter` when the pattern fails to compile.
    fn stream_output(&self, filter: Option<&str>) -> Result<OutputStream>;

    /// Close the channel: cancel the reader task, wait up to
    /// [`DISCONNECT_GRACE`] for it, release the channel, clear the agent id,
    /// and set the status to `Disconnected`.
    ///
    /// Valid from `Connected`, `Connecting`, `Error`, and `Disconnecting`.
    ///
    /// # Errors
    /// `NotConnected` when the connector is already `Disconnected`.
    async fn disconnect(&mut self, reason: DisconnectReason) -> Result<DisconnectOutcome>;

    /// Current lifecycle status
    fn status(&self) -> ConnectionStatus;

    /// Agent this connector is bound to; `None` until connected
    fn agent_id(&self) -> Option<String>;

    /// Last time the channel saw activity (command sent or line captured)
    fn last_activity(&self) -> DateTime<Utc>;

    /// Subscribe to status transitions; dropping the receiver unsubscribes
    fn subscribe_status(&self) -> broadcast::Receiver<StatusChange>;

    /// The output buffer this connector feeds
    fn buffer(&self) -> Arc<OutputBuffer>;
}

pub use subprocess::SubprocessConnector;
pub use terminal::TerminalConnector;
