//! # Orchestra Agent Connector Core
//!
//! The engine an orchestrator uses to attach to, command, and stream output
//! from external AI coding-agent processes. Agents run as independent OS
//! processes; this crate either connects to an existing terminal-style
//! endpoint or spawns the agent CLI headless, then manages the session for
//! its lifetime.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use orchestra_connector::{
//!     ConnectionParams, ConnectionSettings, DefaultConnectorFactory, SessionManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ConnectionSettings::default().validated()?;
//!     let factory = Arc::new(DefaultConnectorFactory::new(settings));
//!     let manager = SessionManager::new(factory);
//!
//!     let params = ConnectionParams::for_socket("/tmp/orchestra_agent.sock");
//!     let outcome = manager.create_session("agent-1", params).await?;
//!     if !outcome.success {
//!         log::error!("connect failed: {:?}", outcome.error);
//!         return Ok(());
//!     }
//!
//!     manager.send_command("agent-1", "status").await?;
//!     for line in manager.read_output("agent-1", None).await? {
//!         log::info!("agent: {line}");
//!     }
//!
//!     manager.disconnect_session("agent-1").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`connector`]: the [`Connector`] trait and its two transports -
//!   [`TerminalConnector`] (Unix domain socket, or a named pipe on Windows)
//!   and [`SubprocessConnector`] (headless agent CLI child process)
//! - [`buffer`]: the bounded, thread-safe [`OutputBuffer`] each connector
//!   feeds
//! - [`session`]: the [`SessionManager`] registry owning connector+buffer
//!   pairs, one session per agent id
//! - [`scheduler`]: the background [`AssignmentLoop`] binding pending tasks
//!   to idle agents
//! - [`store`]: trait contracts for the orchestrator task/agent store and
//!   the session metadata store
//! - [`config`], [`types`], [`error`]: settings, shared records, and the
//!   error taxonomy
//!
//! ## Error handling
//!
//! Expected failures (timeouts, IO errors, bad endpoints) never surface as
//! `Err`: they come back inside [`ConnectionOutcome`] / [`CommandOutcome`] /
//! [`DisconnectOutcome`] records. `Err(`[`ConnectorError`]`)` is reserved
//! for API misuse - connecting twice, disconnecting a disconnected
//! connector, duplicate sessions, malformed filter patterns.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod connector;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod types;

pub use buffer::{DEFAULT_BUFFER_CAPACITY, LineEvent, OutputBuffer, OutputLine};
pub use config::ConnectionSettings;
pub use connector::{Connector, OutputStream, SubprocessConnector, TerminalConnector};
pub use error::{ConnectorError, Result};
pub use scheduler::{AssignmentLoop, DEFAULT_ASSIGNMENT_INTERVAL, assign_pending_tasks};
pub use session::{
    AgentSession, ConnectorFactory, DefaultConnectorFactory, SessionEvent, SessionManager,
};
pub use store::{
    InMemoryOrchestratorStore, InMemorySessionStore, OrchestratorStore, SessionRecord,
    SessionRecordStatus, SessionStore,
};
pub use types::{
    AgentInfo, AgentStatus, CommandOutcome, ConnectionOutcome, ConnectionParams, ConnectionStatus,
    ConnectorType, DisconnectOutcome, DisconnectReason, StatusChange, TaskItem, TaskPriority,
    TaskStatus,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
