//! Background readers for the child process stdio

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::OutputBuffer;
use crate::types::{ConnectionStatus, StatusCell};

/// Shared state handed to the stdout reader task
pub(super) struct ReaderContext {
    pub buffer: Arc<OutputBuffer>,
    pub status: Arc<StatusCell>,
    pub last_activity: Arc<parking_lot::Mutex<DateTime<Utc>>>,
    pub cancel: CancellationToken,
    pub session_id: String,
}

/// Spawn the loop that drains child stdout into the output buffer.
///
/// EOF means the child exited: status goes to `Disconnected`. An IO error
/// moves it to `Error`. Cancellation leaves the status to the disconnect
/// path.
pub(super) fn spawn_stdout_reader(stdout: ChildStdout, ctx: ReaderContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();

        loop {
            line.clear();
            tokio::select! {
                () = ctx.cancel.cancelled() => {
                    log::debug!("[{}] stdout reader cancelled", ctx.session_id);
                    break;
                }
                result = reader.read_line(&mut line) => match result {
                    Ok(0) => {
                        log::info!("[{}] agent process closed stdout", ctx.session_id);
                        ctx.status.set(ConnectionStatus::Disconnected);
                        break;
                    }
                    Ok(_) => {
                        let text = line.trim_end_matches(['\r', '\n']);
                        ctx.buffer.append_line(text);
                        *ctx.last_activity.lock() = Utc::now();
                    }
                    Err(e) => {
                        log::warn!("[{}] stdout reader IO error: {e}", ctx.session_id);
                        ctx.status.set(ConnectionStatus::Error);
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn a task that drains child stderr.
///
/// Piping stderr (rather than inheriting) keeps the child away from the
/// parent terminal; draining it keeps the child from blocking on a full
/// pipe. Content is forwarded to the log at debug level.
pub(super) fn spawn_stderr_drain(stderr: ChildStderr, session_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stderr = stderr;
        let mut chunk = vec![0u8; 4096];

        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&chunk[..n]);
                    log::debug!("[{session_id}] stderr: {}", text.trim_end());
                }
            }
        }
    })
}
