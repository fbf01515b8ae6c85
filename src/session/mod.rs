//! Session aggregate, connector factory, and the session registry

mod factory;
mod manager;
mod session;

pub use factory::{ConnectorFactory, DefaultConnectorFactory};
pub use manager::{SessionEvent, SessionManager};
pub use session::AgentSession;
