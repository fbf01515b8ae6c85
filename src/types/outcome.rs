//! Operation outcome records
//!
//! Expected failures (timeouts, IO errors, validation rejections) are data,
//! not errors: every connect/command/disconnect returns one of these records
//! with a success flag, a human-readable message, and a metadata map carrying
//! diagnostics without leaking stack traces to remote callers.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::DisconnectReason;

/// Outcome of a connect attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOutcome {
    /// Whether the connect succeeded
    pub success: bool,
    /// Session identifier, set on success
    pub session_id: Option<String>,
    /// Failure reason, set on failure
    pub error: Option<String>,
    /// Diagnostic metadata (error kind, timestamps, transport details)
    pub metadata: HashMap<String, Value>,
}

impl ConnectionOutcome {
    /// Successful connect with the given session id
    #[must_use]
    pub fn ok(session_id: impl Into<String>) -> Self {
        Self {
            success: true,
            session_id: Some(session_id.into()),
            error: None,
            metadata: stamped(),
        }
    }

    /// Failed connect with a reason
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            error: Some(error.into()),
            metadata: stamped(),
        }
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of sending a command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command was written and flushed
    pub success: bool,
    /// Failure reason, set on failure
    pub error: Option<String>,
    /// Diagnostic metadata
    pub metadata: HashMap<String, Value>,
}

impl CommandOutcome {
    /// Successful send
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            metadata: stamped(),
        }
    }

    /// Failed send with a reason
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            metadata: stamped(),
        }
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a disconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectOutcome {
    /// Whether the disconnect completed cleanly
    pub success: bool,
    /// Why the disconnect happened
    pub reason: DisconnectReason,
    /// Failure reason, set when cleanup was not clean
    pub error: Option<String>,
    /// Diagnostic metadata
    pub metadata: HashMap<String, Value>,
}

impl DisconnectOutcome {
    /// Clean disconnect
    #[must_use]
    pub fn ok(reason: DisconnectReason) -> Self {
        Self {
            success: true,
            reason,
            error: None,
            metadata: stamped(),
        }
    }

    /// Disconnect that hit a cleanup problem
    #[must_use]
    pub fn failed(reason: DisconnectReason, error: impl Into<String>) -> Self {
        Self {
            success: false,
            reason,
            error: Some(error.into()),
            metadata: stamped(),
        }
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

fn stamped() -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("at".to_string(), Value::String(Utc::now().to_rfc3339()));
    map
}
