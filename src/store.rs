//! External store contracts
//!
//! Two collaborators live behind trait seams: the orchestrator's task/agent
//! store consumed by the assignment loop, and the session metadata store the
//! subprocess connector uses for resume support. In-memory implementations
//! are provided; they back single-process deployments and the test suite.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ConnectorError, Result};
use crate::types::{AgentInfo, AgentStatus, TaskItem, TaskStatus};

// ============================================================================
// ORCHESTRATOR TASK/AGENT STORE
// ============================================================================

/// Task and agent state consumed by the assignment loop
#[async_trait]
pub trait OrchestratorStore: Send + Sync {
    /// All tasks currently in `Pending` status
    async fn pending_tasks(&self) -> Result<Vec<TaskItem>>;

    /// All agents currently in `Idle` status
    async fn idle_agents(&self) -> Result<Vec<AgentInfo>>;

    /// Bind a task to an agent: `status = Assigned`, `agent_id`, `started_at`.
    ///
    /// Only a `Pending` task may be assigned; task status never moves
    /// backward. The agent is not marked `Busy` here; that transition is
    /// driven by the component that actually opens the session.
    async fn assign_task(&self, task_id: &str, agent_id: &str) -> Result<()>;
}

/// In-memory orchestrator store
#[derive(Default)]
pub struct InMemoryOrchestratorStore {
    tasks: Mutex<HashMap<String, TaskItem>>,
    agents: Mutex<HashMap<String, AgentInfo>>,
}

impl InMemoryOrchestratorStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task
    pub async fn upsert_task(&self, task: TaskItem) {
        self.tasks.lock().await.insert(task.id.clone(), task);
    }

    /// Insert or replace an agent
    pub async fn upsert_agent(&self, agent: AgentInfo) {
        self.agents.lock().await.insert(agent.id.clone(), agent);
    }

    /// Change an agent's availability
    pub async fn set_agent_status(&self, agent_id: &str, status: AgentStatus) {
        if let Some(agent) = self.agents.lock().await.get_mut(agent_id) {
            agent.status = status;
        }
    }

    /// Current copy of a task, if present
    pub async fn task(&self, task_id: &str) -> Option<TaskItem> {
        self.tasks.lock().await.get(task_id).cloned()
    }
}

#[async_trait]
impl OrchestratorStore for InMemoryOrchestratorStore {
    async fn pending_tasks(&self) -> Result<Vec<TaskItem>> {
        let tasks = self.tasks.lock().await;
        Ok(tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect())
    }

    async fn idle_agents(&self) -> Result<Vec<AgentInfo>> {
        let agents = self.agents.lock().await;
        Ok(agents
            .values()
            .filter(|a| a.status == AgentStatus::Idle)
            .cloned()
            .collect())
    }

    async fn assign_task(&self, task_id: &str, agent_id: &str) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| ConnectorError::invalid_argument(format!("unknown task {task_id}")))?;
        if task.status != TaskStatus::Pending {
            return Err(ConnectorError::invalid_argument(format!(
                "task {task_id} is not pending (status {:?})",
                task.status
            )));
        }
        task.status = TaskStatus::Assigned;
        task.agent_id = Some(agent_id.to_string());
        task.started_at = Some(Utc::now());
        Ok(())
    }
}

// ============================================================================
// SESSION METADATA STORE
// ============================================================================

/// Stored lifecycle state of a subprocess session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionRecordStatus {
    /// Process is running
    Active,
    /// Process stopped but the session can be resumed
    Paused,
    /// Session finished; resume is rejected
    Closed,
}

/// Persistent metadata for one subprocess session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (also passed to the CLI's resume flag)
    pub session_id: String,
    /// Agent the session belongs to
    pub agent_id: String,
    /// Working directory the CLI was launched in
    pub working_dir: Option<PathBuf>,
    /// Lifecycle state
    pub status: SessionRecordStatus,
    /// OS process id of the most recent launch
    pub process_id: Option<u32>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Last record update
    pub updated_at: DateTime<Utc>,
}

/// Session metadata store used by the subprocess connector.
///
/// All calls from the connector are best-effort: a store failure is logged
/// and the primary operation proceeds without tracking.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session record
    async fn create_record(&self, record: SessionRecord) -> Result<()>;

    /// Update a record's status and process id
    async fn update_status(
        &self,
        session_id: &str,
        status: SessionRecordStatus,
        process_id: Option<u32>,
    ) -> Result<()>;

    /// Load a record by session id
    async fn record(&self, session_id: &str) -> Result<Option<SessionRecord>>;
}

/// In-memory session metadata store
#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, ready to hand to a connector
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_record(&self, record: SessionRecord) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: SessionRecordStatus,
        process_id: Option<u32>,
    ) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| ConnectorError::RecordNotFound(session_id.to_string()))?;
        record.status = status;
        record.process_id = process_id;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.records.lock().await.get(session_id).cloned())
    }
}
