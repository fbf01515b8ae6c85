//! Connector construction behind an injected factory
//!
//! The session manager never looks connectors up from a service container;
//! it is handed a factory at construction, making the dependency visible and
//! substitutable in tests.

use std::sync::Arc;

use crate::buffer::{DEFAULT_BUFFER_CAPACITY, OutputBuffer};
use crate::config::ConnectionSettings;
use crate::connector::{Connector, SubprocessConnector, TerminalConnector};
use crate::store::SessionStore;
use crate::types::ConnectorType;

/// Builds a connector plus the output buffer it feeds
pub trait ConnectorFactory: Send + Sync {
    /// Create a disconnected connector of the requested type and its buffer
    fn create(&self, connector_type: ConnectorType) -> (Box<dyn Connector>, Arc<OutputBuffer>);
}

/// Factory producing the two real connector implementations
pub struct DefaultConnectorFactory {
    settings: ConnectionSettings,
    session_store: Option<Arc<dyn SessionStore>>,
    buffer_capacity: usize,
}

impl DefaultConnectorFactory {
    /// Factory with the default buffer capacity and no session tracking
    #[must_use]
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            session_store: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Track subprocess sessions in the given store
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Override the per-session output buffer capacity
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

impl ConnectorFactory for DefaultConnectorFactory {
    fn create(&self, connector_type: ConnectorType) -> (Box<dyn Connector>, Arc<OutputBuffer>) {
        let buffer = Arc::new(OutputBuffer::with_capacity(self.buffer_capacity));
        let connector: Box<dyn Connector> = match connector_type {
            ConnectorType::Terminal => Box::new(TerminalConnector::with_buffer(
                self.settings.clone(),
                Arc::clone(&buffer),
            )),
            ConnectorType::Subprocess => Box::new(SubprocessConnector::with_buffer(
                Arc::clone(&buffer),
                self.session_store.clone(),
            )),
        };
        (connector, buffer)
    }
}
