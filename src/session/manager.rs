//! Concurrent session registry
//!
//! Owns all active sessions for the process lifetime, keyed by agent id
//! (case-insensitive). The one-session-per-agent invariant is preserved by
//! optimistic insert plus compensating teardown rather than a lock held
//! across the whole connect, so unrelated agents never serialise on each
//! other's connect attempts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::connector::OutputStream;
use crate::error::{ConnectorError, Result};
use crate::session::factory::ConnectorFactory;
use crate::session::session::AgentSession;
use crate::types::{
    CommandOutcome, ConnectionOutcome, ConnectionParams, ConnectionStatus, DisconnectReason,
};

/// Broadcast channel capacity for session events
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Informational session lifecycle events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session was created and connected
    SessionCreated {
        /// Agent the session belongs to
        agent_id: String,
        /// Connector-assigned session identifier
        session_id: String,
    },
    /// A session was removed from the registry
    SessionDisconnected {
        /// Agent the session belonged to
        agent_id: String,
        /// Why the session ended
        reason: DisconnectReason,
    },
    /// A session's connector reported a non-fatal error
    SessionError {
        /// Agent the session belongs to
        agent_id: String,
        /// Human-readable description
        message: String,
    },
}

struct SessionEntry {
    session: AgentSession,
    status_task: JoinHandle<()>,
}

/// Registry of active sessions, one per agent id
pub struct SessionManager {
    factory: Arc<dyn ConnectorFactory>,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Manager using the given connector factory
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectorFactory>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            factory,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
        }
    }

    /// Subscribe to session lifecycle events
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Create and connect a session for `agent_id`.
    ///
    /// Transport failures come back as a failure [`ConnectionOutcome`]; the
    /// partially built connector is disposed first.
    ///
    /// # Errors
    /// `DuplicateSession` when a session already exists for the agent id
    /// (checked again at insert; a lost race tears the new connector back
    /// down); `InvalidArgument` for an empty agent id.
    pub async fn create_session(
        &self,
        agent_id: &str,
        params: ConnectionParams,
    ) -> Result<ConnectionOutcome> {
        if agent_id.trim().is_empty() {
            return Err(ConnectorError::invalid_argument("agent id is empty"));
        }
        let key = registry_key(agent_id);

        if self.sessions.lock().await.contains_key(&key) {
            return Err(ConnectorError::duplicate_session(agent_id));
        }

        let (mut connector, buffer) = self.factory.create(params.connector_type);

        // Forward connector status transitions into the manager event stream.
        let status_task = {
            let mut status_rx = connector.subscribe_status();
            let event_tx = self.event_tx.clone();
            let agent_id = agent_id.to_string();
            tokio::spawn(async move {
                while let Ok(change) = status_rx.recv().await {
                    if change.new == ConnectionStatus::Error {
                        let _ = event_tx.send(SessionEvent::SessionError {
                            agent_id: agent_id.clone(),
                            message: format!(
                                "connector entered Error state (was {})",
                                change.old
                            ),
                        });
                    }
                }
            })
        };

        let outcome = match connector.connect(agent_id, &params).await {
            Ok(outcome) => outcome,
            Err(e) => {
                status_task.abort();
                return Err(e);
            }
        };
        if !outcome.success {
            status_task.abort();
            return Ok(outcome);
        }
        let session_id = outcome
            .session_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let session = AgentSession {
            agent_id: agent_id.to_string(),
            session_id: session_id.clone(),
            connector: Arc::new(Mutex::new(connector)),
            buffer,
            params,
            created_at: Utc::now(),
            last_activity_at: Arc::new(parking_lot::Mutex::new(Utc::now())),
            metadata: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        };

        // Optimistic insert; losing the race means another create finished
        // connecting first, so tear our connector back down.
        let lost_race = {
            let mut sessions = self.sessions.lock().await;
            if sessions.contains_key(&key) {
                true
            } else {
                sessions.insert(
                    key,
                    SessionEntry {
                        session: session.clone(),
                        status_task,
                    },
                );
                false
            }
        };
        if lost_race {
            log::warn!("[{agent_id}] lost create race, disconnecting duplicate connector");
            let mut connector = session.connector.lock().await;
            if let Err(e) = connector.disconnect(DisconnectReason::Error).await {
                log::warn!("[{agent_id}] compensating disconnect failed: {e}");
            }
            return Err(ConnectorError::duplicate_session(agent_id));
        }

        let _ = self.event_tx.send(SessionEvent::SessionCreated {
            agent_id: agent_id.to_string(),
            session_id,
        });
        Ok(outcome)
    }

    /// Look up a session.
    ///
    /// Side effect: refreshes the session's `last_activity_at`, so a lookup
    /// counts as activity.
    pub async fn get_session(&self, agent_id: &str) -> Option<AgentSession> {
        let sessions = self.sessions.lock().await;
        let entry = sessions.get(&registry_key(agent_id))?;
        entry.session.touch();
        Some(entry.session.clone())
    }

    /// Send a command over an agent's session.
    ///
    /// # Errors
    /// `SessionNotFound` when no session exists for the agent id; connector
    /// preconditions propagate unchanged.
    pub async fn send_command(&self, agent_id: &str, command: &str) -> Result<CommandOutcome> {
        let session = self
            .get_session(agent_id)
            .await
            .ok_or_else(|| ConnectorError::session_not_found(agent_id))?;
        let outcome = session.connector.lock().await.send_command(command).await?;
        session.touch();
        Ok(outcome)
    }

    /// Snapshot of an agent's buffered output, optionally filtered.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown agent; `InvalidFilter` for a
    /// malformed pattern.
    pub async fn read_output(&self, agent_id: &str, filter: Option<&str>) -> Result<Vec<String>> {
        let session = self
            .get_session(agent_id)
            .await
            .ok_or_else(|| ConnectorError::session_not_found(agent_id))?;
        session.buffer.lines(filter)
    }

    /// Live tail of an agent's output: backlog first, then new lines.
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown agent; `InvalidFilter` for a
    /// malformed pattern.
    pub async fn stream_output(&self, agent_id: &str, filter: Option<&str>) -> Result<OutputStream> {
        let session = self
            .get_session(agent_id)
            .await
            .ok_or_else(|| ConnectorError::session_not_found(agent_id))?;
        Ok(Box::pin(session.buffer.stream_lines(filter)?))
    }

    /// Disconnect and remove an agent's session.
    ///
    /// Returns `Ok(false)` when no session exists - absence is not an error.
    ///
    /// # Errors
    /// Propagates connector IO errors from the disconnect itself.
    pub async fn disconnect_session(&self, agent_id: &str) -> Result<bool> {
        let Some(entry) = self.sessions.lock().await.remove(&registry_key(agent_id)) else {
            return Ok(false);
        };
        entry.status_task.abort();

        let mut connector = entry.session.connector.lock().await;
        match connector.disconnect(DisconnectReason::UserRequested).await {
            Ok(_) | Err(ConnectorError::NotConnected) => {}
            Err(e) => {
                log::warn!("[{agent_id}] disconnect reported: {e}");
            }
        }
        drop(connector);

        let _ = self.event_tx.send(SessionEvent::SessionDisconnected {
            agent_id: entry.session.agent_id.clone(),
            reason: DisconnectReason::UserRequested,
        });
        Ok(true)
    }

    /// Snapshot list of all active sessions, safe to iterate without holding
    /// any registry lock
    pub async fn sessions(&self) -> Vec<AgentSession> {
        let sessions = self.sessions.lock().await;
        sessions.values().map(|e| e.session.clone()).collect()
    }

    /// Number of active sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Best-effort teardown of every remaining session.
    ///
    /// Per-session failures are logged; teardown of the rest continues.
    pub async fn shutdown(&self) {
        log::info!("shutting down session manager");
        let agent_ids: Vec<String> = {
            let sessions = self.sessions.lock().await;
            sessions.values().map(|e| e.session.agent_id.clone()).collect()
        };
        for agent_id in agent_ids {
            if let Err(e) = self.disconnect_session(&agent_id).await {
                log::warn!("[{agent_id}] teardown failed: {e}");
            }
        }
        log::info!("session manager shutdown complete");
    }
}

/// Registry keys are case-insensitive
fn registry_key(agent_id: &str) -> String {
    agent_id.to_lowercase()
}
