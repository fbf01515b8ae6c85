//! Task and agent records consumed from the orchestrator store
//!
//! These are external records: the assignment loop reads and updates them
//! through the [`OrchestratorStore`](crate::store::OrchestratorStore) contract
//! but does not own their lifecycle.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority tier. Ordering is Low < Normal < High < Critical so that
/// sorting descending yields Critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    /// Background work
    Low,
    /// Default tier
    Normal,
    /// Expedited
    High,
    /// Jump the queue
    Critical,
}

/// Task lifecycle status; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Queued, no agent bound
    Pending,
    /// Bound to an agent by the assignment loop
    Assigned,
    /// Agent is executing the task
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// One queued unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    /// Unique task identifier
    pub id: String,
    /// Agent the task is bound to, once assigned
    pub agent_id: Option<String>,
    /// Command to run
    pub command: String,
    /// Repository the task operates on
    pub repository_path: PathBuf,
    /// Priority tier
    pub priority: TaskPriority,
    /// Current status
    pub status: TaskStatus,
    /// When the task was queued
    pub created_at: DateTime<Utc>,
    /// When the task was assigned/started
    pub started_at: Option<DateTime<Utc>>,
}

impl TaskItem {
    /// A pending task for the given repository
    #[must_use]
    pub fn pending(
        id: impl Into<String>,
        command: impl Into<String>,
        repository_path: impl Into<PathBuf>,
        priority: TaskPriority,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id: None,
            command: command.into(),
            repository_path: repository_path.into(),
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
        }
    }
}

/// Availability state of a known agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    /// Ready for work
    Idle,
    /// Executing a task
    Busy,
    /// Not reachable
    Offline,
    /// Faulted
    Error,
}

/// One known agent, as recorded by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Unique agent identifier
    pub id: String,
    /// Availability state
    pub status: AgentStatus,
    /// Repository the agent is working in
    pub repository_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_critical_first_when_descending() {
        let mut tiers = vec![
            TaskPriority::Normal,
            TaskPriority::Critical,
            TaskPriority::Low,
            TaskPriority::High,
        ];
        tiers.sort_by(|a, b| b.cmp(a));
        assert_eq!(
            tiers,
            vec![
                TaskPriority::Critical,
                TaskPriority::High,
                TaskPriority::Normal,
                TaskPriority::Low,
            ]
        );
    }
}
