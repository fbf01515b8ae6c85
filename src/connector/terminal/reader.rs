//! Background output-reader loop for the terminal channel

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::OutputBuffer;
use crate::types::{ConnectionStatus, StatusCell};

use super::ChannelReader;

/// Shared state handed to the reader task
pub(super) struct ReaderContext {
    pub buffer: Arc<OutputBuffer>,
    pub status: Arc<StatusCell>,
    pub last_activity: Arc<parking_lot::Mutex<DateTime<Utc>>>,
    pub cancel: CancellationToken,
    pub agent_id: String,
}

/// Spawn the loop that drains the read half into the output buffer.
///
/// Runs until cancelled, EOF, or an IO error. EOF moves the status to
/// `Disconnected`; an IO error moves it to `Error`. Cancellation leaves the
/// status alone - the disconnect path owns the final transition.
pub(super) fn spawn_output_reader(read_half: ChannelReader, ctx: ReaderContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        loop {
            line.clear();
            tokio::select! {
                () = ctx.cancel.cancelled() => {
                    log::debug!("[{}] output reader cancelled", ctx.agent_id);
                    break;
                }
                result = reader.read_line(&mut line) => match result {
                    Ok(0) => {
                        // EOF: the agent side closed the channel.
                        log::info!("[{}] agent channel closed (EOF)", ctx.agent_id);
                        ctx.status.set(ConnectionStatus::Disconnected);
                        break;
                    }
                    Ok(_) => {
                        let text = line.trim_end_matches(['\r', '\n']);
                        ctx.buffer.append_line(text);
                        *ctx.last_activity.lock() = Utc::now();
                    }
                    Err(e) => {
                        log::warn!("[{}] output reader IO error: {e}", ctx.agent_id);
                        ctx.status.set(ConnectionStatus::Error);
                        break;
                    }
                }
            }
        }
    })
}
