//! Transport method selection and endpoint validation

use std::path::{Path, PathBuf};

use crate::config::ConnectionSettings;
use crate::error::{ConnectorError, Result};
use crate::types::ConnectionParams;

/// Unix domain socket paths are limited by `sun_path` (108 bytes on Linux)
pub const MAX_SOCKET_PATH_LEN: usize = 108;

/// Named pipe names must stay under 256 characters
pub const MAX_PIPE_NAME_LEN: usize = 256;

/// The concrete IPC endpoint a terminal connect will target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMethod {
    /// Unix domain socket at the given filesystem path
    UnixSocket(PathBuf),
    /// Windows named pipe with the given name
    NamedPipe(String),
}

impl ConnectionMethod {
    /// Short label for logs and outcome metadata
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnixSocket(_) => "unix_socket",
            Self::NamedPipe(_) => "named_pipe",
        }
    }
}

/// Whether this build can open Unix domain sockets.
///
/// Tokio exposes `UnixStream` on unix targets only; on Windows the named
/// pipe transport is the supported path.
#[must_use]
pub fn platform_supports_unix_sockets() -> bool {
    cfg!(unix)
}

/// Whether this build can open Windows named pipes
#[must_use]
pub fn platform_supports_named_pipes() -> bool {
    cfg!(windows)
}

/// Validate a named pipe name: non-empty, no backslash, length < 256.
///
/// # Errors
/// Returns `InvalidArgument` describing the first rule violated.
pub fn validate_pipe_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConnectorError::invalid_argument("pipe name is empty"));
    }
    if name.contains('\\') {
        return Err(ConnectorError::invalid_argument(format!(
            "pipe name '{name}' must not contain a backslash"
        )));
    }
    if name.len() >= MAX_PIPE_NAME_LEN {
        return Err(ConnectorError::invalid_argument(format!(
            "pipe name length {} exceeds the {MAX_PIPE_NAME_LEN} character limit",
            name.len()
        )));
    }
    Ok(())
}

/// Validate a socket path: absolute, length < 108, parent directory exists.
///
/// # Errors
/// Returns `InvalidArgument` describing the first rule violated.
pub fn validate_socket_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(ConnectorError::invalid_argument(format!(
            "socket path '{}' must be absolute",
            path.display()
        )));
    }
    let len = path.as_os_str().len();
    if len >= MAX_SOCKET_PATH_LEN {
        return Err(ConnectorError::invalid_argument(format!(
            "socket path length {len} exceeds the {MAX_SOCKET_PATH_LEN} byte limit"
        )));
    }
    match path.parent() {
        Some(parent) if parent.is_dir() => Ok(()),
        _ => Err(ConnectorError::invalid_argument(format!(
            "socket path parent directory does not exist: {}",
            path.display()
        ))),
    }
}

/// Pick the IPC endpoint for a connect attempt, in priority order:
/// explicit socket, explicit pipe, configured default socket, configured
/// default pipe. The chosen endpoint is validated before being returned.
///
/// # Errors
/// Returns `InvalidArgument` when no transport is available for this
/// platform/configuration, or when the chosen endpoint fails validation.
pub fn preferred_connection_method(
    params: &ConnectionParams,
    settings: &ConnectionSettings,
) -> Result<ConnectionMethod> {
    let sockets_usable = settings.use_unix_sockets && platform_supports_unix_sockets();
    let pipes_usable = settings.use_named_pipes && platform_supports_named_pipes();

    if let Some(path) = &params.socket_path
        && sockets_usable
    {
        validate_socket_path(path)?;
        return Ok(ConnectionMethod::UnixSocket(path.clone()));
    }
    if let Some(name) = &params.pipe_name
        && pipes_usable
    {
        validate_pipe_name(name)?;
        return Ok(ConnectionMethod::NamedPipe(name.clone()));
    }
    if let Some(path) = &settings.default_socket_path
        && sockets_usable
    {
        validate_socket_path(path)?;
        return Ok(ConnectionMethod::UnixSocket(path.clone()));
    }
    if let Some(name) = &settings.default_pipe_name
        && pipes_usable
    {
        validate_pipe_name(name)?;
        return Ok(ConnectionMethod::NamedPipe(name.clone()));
    }

    Err(ConnectorError::invalid_argument(
        "no connection method available: no usable socket path or pipe name \
         for this platform and configuration",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_name_rules() {
        assert!(validate_pipe_name("orchestra_agent_pipe").is_ok());
        assert!(validate_pipe_name("").is_err());
        assert!(validate_pipe_name("a\\b").is_err());
        assert!(validate_pipe_name(&"x".repeat(300)).is_err());
    }

    #[test]
    fn socket_path_rules() {
        assert!(validate_socket_path(Path::new("/tmp/agent.sock")).is_ok());
        assert!(validate_socket_path(Path::new("relative/agent.sock")).is_err());

        let long = format!("/tmp/{}.sock", "x".repeat(120));
        assert!(validate_socket_path(Path::new(&long)).is_err());

        assert!(validate_socket_path(Path::new("/no/such/parent/agent.sock")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn explicit_socket_wins_over_defaults() {
        let params = ConnectionParams::for_socket("/tmp/explicit.sock");
        let settings = ConnectionSettings::default();
        let method = preferred_connection_method(&params, &settings).unwrap();
        assert_eq!(
            method,
            ConnectionMethod::UnixSocket(PathBuf::from("/tmp/explicit.sock"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn falls_back_to_default_socket() {
        let params = ConnectionParams::default();
        let settings = ConnectionSettings::default();
        let method = preferred_connection_method(&params, &settings).unwrap();
        assert_eq!(
            method,
            ConnectionMethod::UnixSocket(PathBuf::from("/tmp/orchestra_agent.sock"))
        );
    }

    #[test]
    fn no_method_is_a_descriptive_error() {
        let params = ConnectionParams::default();
        let settings = ConnectionSettings {
            use_unix_sockets: false,
            default_socket_path: None,
            default_pipe_name: None,
            ..ConnectionSettings::default()
        };
        let err = preferred_connection_method(&params, &settings).unwrap_err();
        assert!(err.to_string().contains("no connection method available"));
    }
}
