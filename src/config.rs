//! Connection settings shared by the terminal connector and session manager

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// Minimum allowed connect timeout (1 second)
pub const MIN_CONNECTION_TIMEOUT_MS: u64 = 1_000;

/// Maximum allowed connect timeout (5 minutes)
pub const MAX_CONNECTION_TIMEOUT_MS: u64 = 300_000;

/// Default connect timeout (30 seconds)
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Settings controlling which IPC transports are available and how long a
/// connect attempt may take.
///
/// Validated fail-fast at construction; an instance that exists is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Allow Unix domain socket transport
    pub use_unix_sockets: bool,

    /// Allow Windows named pipe transport
    pub use_named_pipes: bool,

    /// Socket path used when the connection parameters do not name one
    pub default_socket_path: Option<PathBuf>,

    /// Pipe name used when the connection parameters do not name one
    pub default_pipe_name: Option<String>,

    /// Connect timeout in milliseconds (1,000–300,000)
    pub connection_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            use_unix_sockets: true,
            use_named_pipes: true,
            default_socket_path: Some(PathBuf::from("/tmp/orchestra_agent.sock")),
            default_pipe_name: Some("orchestra_agent_pipe".to_string()),
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl ConnectionSettings {
    /// Validate and return the settings, consuming self.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if both transports are disabled or the timeout
    /// is outside the 1s–300s range.
    pub fn validated(self) -> Result<Self> {
        if !self.use_unix_sockets && !self.use_named_pipes {
            return Err(ConnectorError::invalid_config(
                "at least one of use_unix_sockets / use_named_pipes must be enabled",
            ));
        }
        if self.connection_timeout_ms < MIN_CONNECTION_TIMEOUT_MS
            || self.connection_timeout_ms > MAX_CONNECTION_TIMEOUT_MS
        {
            return Err(ConnectorError::invalid_config(format!(
                "connection_timeout_ms must be between {MIN_CONNECTION_TIMEOUT_MS} and \
                 {MAX_CONNECTION_TIMEOUT_MS}, got {}",
                self.connection_timeout_ms
            )));
        }
        Ok(self)
    }

    /// Connect timeout as a `Duration`
    #[must_use]
    pub fn connection_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.connection_timeout_ms)
    }
}
