//! Connection parameters supplied when opening a session

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which transport implementation a session should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorType {
    /// Attach to an existing terminal endpoint (Unix socket / named pipe)
    #[default]
    Terminal,
    /// Spawn the agent CLI as a child process with piped stdio
    Subprocess,
}

/// Inputs needed to reach an agent endpoint.
///
/// Which fields matter depends on `connector_type`; each connector validates
/// the parameters against its own rules before attempting any I/O.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Transport implementation to use
    pub connector_type: ConnectorType,

    /// Working directory for a spawned agent process
    pub working_dir: Option<PathBuf>,

    /// Explicit Unix domain socket path (terminal connector)
    pub socket_path: Option<PathBuf>,

    /// Explicit named pipe name (terminal connector, Windows)
    pub pipe_name: Option<String>,

    /// Process id of an already-running agent, when known
    pub process_id: Option<u32>,

    /// Explicit path to the agent CLI binary (subprocess connector);
    /// searched on PATH when absent
    pub cli_path: Option<PathBuf>,
}

impl ConnectionParams {
    /// Parameters targeting an explicit socket path
    #[must_use]
    pub fn for_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parameters targeting an explicit pipe name
    #[must_use]
    pub fn for_pipe(name: impl Into<String>) -> Self {
        Self {
            pipe_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parameters for spawning the agent CLI in the given directory
    #[must_use]
    pub fn for_subprocess(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            connector_type: ConnectorType::Subprocess,
            working_dir: Some(working_dir.into()),
            ..Self::default()
        }
    }
}
