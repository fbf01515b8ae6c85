//! Terminal connector: attaches to an existing agent endpoint over a Unix
//! domain socket or, on Windows, a named pipe

mod method;
mod reader;

pub use method::{
    ConnectionMethod, MAX_PIPE_NAME_LEN, MAX_SOCKET_PATH_LEN, platform_supports_named_pipes,
    platform_supports_unix_sockets, preferred_connection_method, validate_pipe_name,
    validate_socket_path,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::buffer::OutputBuffer;
use crate::config::ConnectionSettings;
use crate::error::{ConnectorError, Result};
use crate::types::{
    CommandOutcome, ConnectionOutcome, ConnectionParams, ConnectionStatus, DisconnectOutcome,
    DisconnectReason, StatusCell, StatusChange,
};

use super::{Connector, DISCONNECT_GRACE, OutputStream};
use reader::{ReaderContext, spawn_output_reader};

/// Object-safe byte channel; both socket and pipe streams satisfy this
pub(crate) trait IpcChannel: AsyncRead + AsyncWrite + Send + Sync + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> IpcChannel for T {}

pub(super) type ChannelReader = tokio::io::ReadHalf<Box<dyn IpcChannel>>;
type ChannelWriter = tokio::io::WriteHalf<Box<dyn IpcChannel>>;

/// Connector that attaches to a pre-existing agent terminal endpoint.
///
/// The endpoint is chosen by [`preferred_connection_method`]; the connect
/// attempt is bounded by the configured timeout. One background reader task
/// drains the channel into the output buffer for the lifetime of the
/// connection.
pub struct TerminalConnector {
    settings: ConnectionSettings,
    buffer: Arc<OutputBuffer>,
    status: Arc<StatusCell>,
    last_activity: Arc<parking_lot::Mutex<DateTime<Utc>>>,
    agent_id: Option<String>,
    session_id: Option<String>,
    writer: Option<ChannelWriter>,
    reader_task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl TerminalConnector {
    /// Create a disconnected terminal connector with its own buffer
    #[must_use]
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_buffer(settings, Arc::new(OutputBuffer::new()))
    }

    /// Create a disconnected terminal connector feeding the given buffer
    #[must_use]
    pub fn with_buffer(settings: ConnectionSettings, buffer: Arc<OutputBuffer>) -> Self {
        Self {
            settings,
            buffer,
            status: Arc::new(StatusCell::new()),
            last_activity: Arc::new(parking_lot::Mutex::new(Utc::now())),
            agent_id: None,
            session_id: None,
            writer: None,
            reader_task: None,
            cancel: None,
        }
    }

    /// Session identifier of the current connection, if any
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    /// Tear down everything a partially failed connect may have created
    fn dispose_partial(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.writer = None;
        self.session_id = None;
        self.agent_id = None;
    }
}

/// Open the byte channel for the chosen method under the given timeout
async fn open_channel(
    method: &ConnectionMethod,
    timeout: Duration,
) -> std::result::Result<Box<dyn IpcChannel>, String> {
    match method {
        #[cfg(unix)]
        ConnectionMethod::UnixSocket(path) => {
            match tokio::time::timeout(timeout, tokio::net::UnixStream::connect(path)).await {
                Ok(Ok(stream)) => Ok(Box::new(stream)),
                Ok(Err(e)) => Err(format!(
                    "failed to connect to socket {}: {e}",
                    path.display()
                )),
                Err(_) => Err(format!(
                    "timed out after {timeout:?} connecting to socket {}",
                    path.display()
                )),
            }
        }
        #[cfg(not(unix))]
        ConnectionMethod::UnixSocket(path) => Err(format!(
            "unix domain sockets are not supported on this platform (path {})",
            path.display()
        )),
        #[cfg(windows)]
        ConnectionMethod::NamedPipe(name) => {
            use tokio::net::windows::named_pipe::ClientOptions;

            const ERROR_PIPE_BUSY: i32 = 231;

            let address = format!(r"\\.\pipe\{name}");
            let connect = async {
                loop {
                    match ClientOptions::new().open(&address) {
                        Ok(client) => break Ok(client),
                        Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        Err(e) => break Err(e),
                    }
                }
            };
            match tokio::time::timeout(timeout, connect).await {
                Ok(Ok(client)) => Ok(Box::new(client) as Box<dyn IpcChannel>),
                Ok(Err(e)) => Err(format!("failed to connect to pipe {name}: {e}")),
                Err(_) => Err(format!("timed out after {timeout:?} connecting to pipe {name}")),
            }
        }
        #[cfg(not(windows))]
        ConnectionMethod::NamedPipe(name) => Err(format!(
            "named pipes are not supported on this platform (pipe {name})"
        )),
    }
}

#[async_trait]
impl Connector for TerminalConnector {
    async fn connect(
        &mut self,
        agent_id: &str,
        params: &ConnectionParams,
    ) -> Result<ConnectionOutcome> {
        let current = self.status.get();
        if current != ConnectionStatus::Disconnected {
            return Err(ConnectorError::AlreadyConnected(current.to_string()));
        }
        if agent_id.trim().is_empty() {
            return Err(ConnectorError::invalid_argument("agent id is empty"));
        }

        self.status.set(ConnectionStatus::Connecting);

        let method = match preferred_connection_method(params, &self.settings) {
            Ok(method) => method,
            Err(e) => {
                self.status.set(ConnectionStatus::Disconnected);
                return Ok(ConnectionOutcome::failed(e.to_string())
                    .with_meta("stage", "method_selection"));
            }
        };

        let stream = match open_channel(&method, self.settings.connection_timeout()).await {
            Ok(stream) => stream,
            Err(message) => {
                self.dispose_partial();
                self.status.set(ConnectionStatus::Disconnected);
                return Ok(ConnectionOutcome::failed(message)
                    .with_meta("stage", "connect")
                    .with_meta("method", method.kind()));
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let cancel = CancellationToken::new();
        let session_id = Uuid::new_v4().to_string();

        self.reader_task = Some(spawn_output_reader(
            read_half,
            ReaderContext {
                buffer: Arc::clone(&self.buffer),
                status: Arc::clone(&self.status),
                last_activity: Arc::clone(&self.last_activity),
                cancel: cancel.clone(),
                agent_id: agent_id.to_string(),
            },
        ));
        self.writer = Some(write_half);
        self.cancel = Some(cancel);
        self.agent_id = Some(agent_id.to_string());
        self.session_id = Some(session_id.clone());
        *self.last_activity.lock() = Utc::now();

        self.status.set(ConnectionStatus::Connected);
        log::info!("[{agent_id}] connected via {}", method.kind());

        Ok(ConnectionOutcome::ok(session_id).with_meta("method", method.kind()))
    }

    async fn send_command(&mut self, command: &str) -> Result<CommandOutcome> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ConnectorError::NotConnected);
        };

        let write = async {
            writer.write_all(command.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };

        match write.await {
            Ok(()) => {
                *self.last_activity.lock() = Utc::now();
                Ok(CommandOutcome::ok())
            }
            Err(e) => {
                let gone = matches!(
                    e.kind(),
                    std::io::ErrorKind::BrokenPipe
                        | std::io::ErrorKind::NotConnected
                        | std::io::ErrorKind::ConnectionReset
                );
                self.status.set(if gone {
                    ConnectionStatus::Disconnected
                } else {
                    ConnectionStatus::Error
                });
                Ok(CommandOutcome::failed(format!("failed to send command: {e}"))
                    .with_meta("error_kind", format!("{:?}", e.kind())))
            }
        }
    }

    fn read_output(&self, filter: Option<&str>) -> Result<Vec<String>> {
        self.buffer.lines(filter)
    }

    fn stream_output(&self, filter: Option<&str>) -> Result<OutputStream> {
        Ok(Box::pin(self.buffer.stream_lines(filter)?))
    }

    async fn disconnect(&mut self, reason: DisconnectReason) -> Result<DisconnectOutcome> {
        let current = self.status.get();
        if current == ConnectionStatus::Disconnected {
            return Err(ConnectorError::NotConnected);
        }

        self.status.set(ConnectionStatus::Disconnecting);

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.reader_task.take()
            && tokio::time::timeout(DISCONNECT_GRACE, task).await.is_err()
        {
            // Abandon the task; dropping the JoinHandle detaches it.
            log::warn!(
                "[{}] output reader did not stop within {DISCONNECT_GRACE:?}, abandoning",
                self.agent_id.as_deref().unwrap_or("?")
            );
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }

        let agent_id = self.agent_id.take();
        self.session_id = None;
        self.status.set(ConnectionStatus::Disconnected);
        log::info!("[{}] disconnected", agent_id.as_deref().unwrap_or("?"));

        Ok(DisconnectOutcome::ok(reason))
    }

    fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    fn agent_id(&self) -> Option<String> {
        self.agent_id.clone()
    }

    fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    fn subscribe_status(&self) -> tokio::sync::broadcast::Receiver<StatusChange> {
        self.status.subscribe()
    }

    fn buffer(&self) -> Arc<OutputBuffer> {
        self.buffer.clone()
    }
}
