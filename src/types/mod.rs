//! Core type definitions for connectors, sessions, and consumed orchestrator
//! records

pub mod outcome;
pub mod params;
pub mod status;
pub mod task;

pub use outcome::{CommandOutcome, ConnectionOutcome, DisconnectOutcome};
pub use params::{ConnectionParams, ConnectorType};
pub use status::{ConnectionStatus, DisconnectReason, StatusCell, StatusChange};
pub use task::{AgentInfo, AgentStatus, TaskItem, TaskPriority, TaskStatus};
