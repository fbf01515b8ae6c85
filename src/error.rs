//! Error types for the Orchestra connector core

use thiserror::Error;

/// Main error type for connector and session operations.
///
/// Only API misuse and invalid inputs surface as errors. Transport-level
/// failures (timeouts, broken pipes, spawn failures) are reported inside the
/// operation outcome types instead, with a status transition on the connector.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Agent CLI binary not found or not installed
    #[error("Agent CLI not found: {0}")]
    CliNotFound(String),

    /// Connect called on a connector that is not Disconnected
    #[error("Connector is already connected (status: {0})")]
    AlreadyConnected(String),

    /// Disconnect called on a connector that is already Disconnected
    #[error("Connector is not connected")]
    NotConnected,

    /// A session already exists for the agent id
    #[error("A session already exists for agent '{0}'")]
    DuplicateSession(String),

    /// No session registered for the agent id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No stored session record for the subprocess session id
    #[error("Session record not found: {0}")]
    RecordNotFound(String),

    /// Malformed output filter pattern
    #[error("Invalid output filter pattern: {0}")]
    InvalidFilter(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Required argument missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Session metadata (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl ConnectorError {
    /// Create a CLI not found error with install guidance
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Agent CLI not found in PATH or common install locations.\n\
             Install the agent CLI or pass an explicit path in the \
             connection parameters"
                .to_string(),
        )
    }

    /// Create an invalid filter error
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a duplicate session error
    pub fn duplicate_session(agent_id: impl Into<String>) -> Self {
        Self::DuplicateSession(agent_id.into())
    }

    /// Create a session not found error
    pub fn session_not_found(agent_id: impl Into<String>) -> Self {
        Self::SessionNotFound(agent_id.into())
    }
}
