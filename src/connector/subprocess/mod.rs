//! Subprocess connector: spawns the agent CLI headless with piped stdio

mod command;
mod reader;

pub use command::{CommandBuilder, LaunchMode, find_cli};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::buffer::OutputBuffer;
use crate::error::{ConnectorError, Result};
use crate::store::{SessionRecord, SessionRecordStatus, SessionStore};
use crate::types::{
    CommandOutcome, ConnectionOutcome, ConnectionParams, ConnectionStatus, DisconnectOutcome,
    DisconnectReason, StatusCell, StatusChange,
};

use super::{Connector, DISCONNECT_GRACE, OutputStream};
use reader::{ReaderContext, spawn_stderr_drain, spawn_stdout_reader};

/// Connector that owns a headless agent CLI child process.
///
/// Session metadata is persisted through an optional [`SessionStore`] so a
/// paused session can later be reattached with
/// [`resume_session`](SubprocessConnector::resume_session). Store failures
/// are logged and never fail the primary operation.
pub struct SubprocessConnector {
    store: Option<Arc<dyn SessionStore>>,
    buffer: Arc<OutputBuffer>,
    status: Arc<StatusCell>,
    last_activity: Arc<parking_lot::Mutex<DateTime<Utc>>>,
    agent_id: Option<String>,
    session_id: Option<String>,
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl SubprocessConnector {
    /// Create a disconnected subprocess connector with its own buffer and no
    /// session tracking
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(Arc::new(OutputBuffer::new()), None)
    }

    /// Create a disconnected subprocess connector feeding the given buffer,
    /// optionally tracking sessions in `store`
    #[must_use]
    pub fn with_buffer(buffer: Arc<OutputBuffer>, store: Option<Arc<dyn SessionStore>>) -> Self {
        Self {
            store,
            buffer,
            status: Arc::new(StatusCell::new()),
            last_activity: Arc::new(parking_lot::Mutex::new(Utc::now())),
            agent_id: None,
            session_id: None,
            process: None,
            stdin: None,
            reader_task: None,
            stderr_task: None,
            cancel: None,
        }
    }

    /// Session identifier of the current connection, if any
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    /// Reattach to a previously paused session.
    ///
    /// Loads the stored record, relaunches the CLI with the resume flag in
    /// the session's original working directory, and marks the record
    /// `Active` with the new process id. An unknown or `Closed` record is a
    /// failure outcome.
    ///
    /// # Errors
    /// `AlreadyConnected` when the connector is not `Disconnected`;
    /// `InvalidConfig` when no session store is configured.
    pub async fn resume_session(&mut self, session_id: &str) -> Result<ConnectionOutcome> {
        let current = self.status.get();
        if current != ConnectionStatus::Disconnected {
            return Err(ConnectorError::AlreadyConnected(current.to_string()));
        }
        let Some(store) = self.store.clone() else {
            return Err(ConnectorError::invalid_config(
                "cannot resume: no session store configured",
            ));
        };

        let record = match store.record(session_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Ok(ConnectionOutcome::failed(format!(
                    "session record not found: {session_id}"
                )));
            }
            Err(e) => {
                return Ok(
                    ConnectionOutcome::failed(format!("failed to load session record: {e}"))
                        .with_meta("stage", "load_record"),
                );
            }
        };
        if record.status == SessionRecordStatus::Closed {
            return Ok(ConnectionOutcome::failed(format!(
                "session {session_id} is closed and cannot be resumed"
            )));
        }

        self.status.set(ConnectionStatus::Connecting);
        let mode = LaunchMode::Resume {
            session_id: session_id.to_string(),
        };
        let outcome = self
            .launch(record.agent_id.clone(), mode, record.working_dir.clone(), None)
            .await;

        if let Ok(outcome) = &outcome
            && outcome.success
            && let Err(e) = store
                .update_status(session_id, SessionRecordStatus::Active, self.process_id())
                .await
        {
            log::warn!("[{session_id}] failed to mark session record Active: {e}");
        }
        outcome
    }

    /// OS process id of the running child, if any
    #[must_use]
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().and_then(Child::id)
    }

    /// Spawn the CLI and wire up stdio. Caller has already moved the status
    /// to `Connecting`; this settles it to `Connected` or back to
    /// `Disconnected`.
    async fn launch(
        &mut self,
        agent_id: String,
        mode: LaunchMode,
        working_dir: Option<PathBuf>,
        cli_path: Option<PathBuf>,
    ) -> Result<ConnectionOutcome> {
        let session_id = match &mode {
            LaunchMode::Headless { session_id } | LaunchMode::Resume { session_id } => {
                session_id.clone()
            }
        };

        let cli_path = match cli_path.map_or_else(find_cli, Ok) {
            Ok(path) => path,
            Err(e) => {
                self.status.set(ConnectionStatus::Disconnected);
                return Ok(ConnectionOutcome::failed(e.to_string()).with_meta("stage", "find_cli"));
            }
        };

        let mut cmd = CommandBuilder::new(&cli_path, &mode, working_dir.as_deref()).build();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.status.set(ConnectionStatus::Disconnected);
                let message = match &working_dir {
                    Some(dir) if !dir.exists() => {
                        format!("working directory does not exist: {}", dir.display())
                    }
                    _ => format!("failed to start agent CLI: {e}"),
                };
                return Ok(ConnectionOutcome::failed(message).with_meta("stage", "spawn"));
            }
        };

        let Some(stdin) = child.stdin.take() else {
            let _ = child.start_kill();
            self.status.set(ConnectionStatus::Disconnected);
            return Ok(ConnectionOutcome::failed("failed to get stdin handle"));
        };
        let Some(stdout) = child.stdout.take() else {
            let _ = child.start_kill();
            self.status.set(ConnectionStatus::Disconnected);
            return Ok(ConnectionOutcome::failed("failed to get stdout handle"));
        };
        let Some(stderr) = child.stderr.take() else {
            let _ = child.start_kill();
            self.status.set(ConnectionStatus::Disconnected);
            return Ok(ConnectionOutcome::failed("failed to get stderr handle"));
        };

        let cancel = CancellationToken::new();
        self.reader_task = Some(spawn_stdout_reader(
            stdout,
            ReaderContext {
                buffer: Arc::clone(&self.buffer),
                status: Arc::clone(&self.status),
                last_activity: Arc::clone(&self.last_activity),
                cancel: cancel.clone(),
                session_id: session_id.clone(),
            },
        ));
        self.stderr_task = Some(spawn_stderr_drain(stderr, session_id.clone()));

        let pid = child.id();
        self.process = Some(child);
        self.stdin = Some(stdin);
        self.cancel = Some(cancel);
        self.agent_id = Some(agent_id.clone());
        self.session_id = Some(session_id.clone());
        *self.last_activity.lock() = Utc::now();

        self.status.set(ConnectionStatus::Connected);
        log::info!("[{agent_id}] agent CLI started (session {session_id}, pid {pid:?})");

        let mut outcome = ConnectionOutcome::ok(session_id);
        if let Some(pid) = pid {
            outcome = outcome.with_meta("process_id", pid);
        }
        Ok(outcome)
    }
}

impl Default for SubprocessConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SubprocessConnector {
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

        let session_id = Uuid::new_v4().to_string();
        let mode = LaunchMode::Headless {
            session_id: session_id.clone(),
        };
        let outcome = self
            .launch(
                agent_id.to_string(),
                mode,
                params.working_dir.clone(),
                params.cli_path.clone(),
            )
            .await?;

        // Best effort: a storage failure downgrades to an untracked session.
        if outcome.success
            && let Some(store) = &self.store
        {
            let now = Utc::now();
            let record = SessionRecord {
                session_id: session_id.clone(),
                agent_id: agent_id.to_string(),
                working_dir: params.working_dir.clone(),
                status: SessionRecordStatus::Active,
                process_id: self.process_id(),
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = store.create_record(record).await {
                log::warn!("[{session_id}] session record not persisted: {e}");
            }
        }

        Ok(outcome)
    }

    async fn send_command(&mut self, command: &str) -> Result<CommandOutcome> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ConnectorError::NotConnected);
        };

        let write = async {
            stdin.write_all(command.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };

        match write.await {
            Ok(()) => {
                *self.last_activity.lock() = Utc::now();
                Ok(CommandOutcome::ok())
            }
            Err(e) => {
                let gone = matches!(
                    e.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected
                );
                self.status.set(if gone {
                    ConnectionStatus::Disconnected
                } else {
                    ConnectionStatus::Error
                });
                Ok(
                    CommandOutcome::failed(format!("failed to write to agent stdin: {e}"))
                        .with_meta("error_kind", format!("{:?}", e.kind())),
                )
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
        let session_id = self.session_id.clone();

        // Closing stdin asks the CLI to finish up and exit.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        let mut forced = false;
        if let Some(mut child) = self.process.take() {
            match tokio::time::timeout(DISCONNECT_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    log::debug!("agent process exited with {status}");
                }
                Ok(Err(e)) => {
                    log::warn!("error waiting for agent process: {e}");
                }
                Err(_) => {
                    log::warn!("agent process did not exit within {DISCONNECT_GRACE:?}, killing");
                    forced = true;
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }

        if let Some(task) = self.reader_task.take()
            && tokio::time::timeout(DISCONNECT_GRACE, task).await.is_err()
        {
            log::warn!("stdout reader did not stop within {DISCONNECT_GRACE:?}, abandoning");
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        // Paused, not deleted: a later resume_session can reattach.
        if let Some(store) = &self.store
            && let Some(session_id) = &session_id
            && let Err(e) = store
                .update_status(session_id, SessionRecordStatus::Paused, None)
                .await
        {
            log::warn!("[{session_id}] session record not marked Paused: {e}");
        }

        let agent_id = self.agent_id.take();
        self.session_id = None;
        self.status.set(ConnectionStatus::Disconnected);
        log::info!("[{}] subprocess disconnected", agent_id.as_deref().unwrap_or("?"));

        Ok(DisconnectOutcome::ok(reason).with_meta("forced_kill", forced))
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

impl Drop for SubprocessConnector {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        if let Some(mut child) = self.process.take() {
            let _ = child.start_kill();
        }
    }
}
