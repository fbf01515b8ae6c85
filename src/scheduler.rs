//! Background task-assignment loop
//!
//! Periodically binds pending tasks to idle agents using the orchestrator
//! store. The loop only changes which agent a task is bound to; opening and
//! driving the matching session is the transport layer's job, and the agent
//! is never marked `Busy` here.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::store::OrchestratorStore;
use crate::types::AgentInfo;

/// Default time between assignment ticks
pub const DEFAULT_ASSIGNMENT_INTERVAL: Duration = Duration::from_secs(2);

/// Handle to the running assignment loop
pub struct AssignmentLoop {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl AssignmentLoop {
    /// Spawn the loop with the default 2 second interval
    #[must_use]
    pub fn spawn(store: Arc<dyn OrchestratorStore>) -> Self {
        Self::spawn_with_interval(store, DEFAULT_ASSIGNMENT_INTERVAL)
    }

    /// Spawn the loop with an explicit tick interval
    #[must_use]
    pub fn spawn_with_interval(store: Arc<dyn OrchestratorStore>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        log::debug!("assignment loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match assign_pending_tasks(store.as_ref()).await {
                            Ok(0) => {}
                            Ok(n) => log::info!("assigned {n} task(s)"),
                            Err(e) => log::warn!("assignment tick failed: {e}"),
                        }
                    }
                }
            }
        });
        Self { handle, cancel }
    }

    /// Stop the loop and wait for the current tick to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for AssignmentLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One assignment pass: match pending tasks to idle agents.
///
/// Tasks are taken in priority order (Critical first), FIFO within a tier.
/// Each task prefers an idle agent bound to the same repository and falls
/// back to any idle agent; an agent is used at most once per pass. Tasks
/// with no agent stay `Pending` for the next tick. Empty task or agent sets
/// are a quiet no-op.
///
/// Returns the number of tasks assigned.
///
/// # Errors
/// Propagates store failures; a failed pass is retried on the next tick.
pub async fn assign_pending_tasks(store: &dyn OrchestratorStore) -> Result<usize> {
    let mut tasks = store.pending_tasks().await?;
    let mut available: Vec<AgentInfo> = store.idle_agents().await?;
    if tasks.is_empty() || available.is_empty() {
        return Ok(0);
    }

    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    let mut assigned = 0;
    for task in tasks {
        if available.is_empty() {
            break;
        }
        // Repository affinity first, then any idle agent.
        let idx = available
            .iter()
            .position(|agent| agent.repository_path == task.repository_path)
            .unwrap_or(0);
        let agent = available.swap_remove(idx);

        store.assign_task(&task.id, &agent.id).await?;
        log::debug!("task {} assigned to agent {}", task.id, agent.id);
        assigned += 1;
    }
    Ok(assigned)
}
