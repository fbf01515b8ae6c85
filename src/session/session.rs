//! Session aggregate: one agent, one connector, one output buffer

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::buffer::OutputBuffer;
use crate::connector::Connector;
use crate::types::ConnectionParams;

/// Runtime pairing of one agent id with its connector and output buffer.
///
/// The session exclusively owns both; neither is shared with any other
/// session, and both are disposed when the session is removed from the
/// registry. Clones of this handle share the same underlying state.
#[derive(Clone)]
pub struct AgentSession {
    /// Agent this session belongs to (as supplied by the caller)
    pub agent_id: String,

    /// Session identifier returned by the connector on connect
    pub session_id: String,

    /// The transport; behind an async mutex because commands and disconnects
    /// need exclusive access
    pub connector: Arc<Mutex<Box<dyn Connector>>>,

    /// The output buffer the connector feeds
    pub buffer: Arc<OutputBuffer>,

    /// Parameters the session was opened with
    pub params: ConnectionParams,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Refreshed on lookup and on every command
    pub last_activity_at: Arc<parking_lot::Mutex<DateTime<Utc>>>,

    /// Free-form session metadata
    pub metadata: Arc<parking_lot::Mutex<HashMap<String, Value>>>,
}

impl AgentSession {
    /// Last activity timestamp
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity_at.lock()
    }

    /// Mark the session as active now
    pub fn touch(&self) {
        *self.last_activity_at.lock() = Utc::now();
    }
}
