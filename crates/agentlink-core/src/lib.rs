//! Session coordination for AgentLink: registry, coordinator, and approval routing.

pub mod authorize;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod replay;
pub mod translate;
pub mod transport;

pub use authorize::{RememberedEntries, SessionBinding, ToolAuthorizer};
pub use coordinator::{
    CoordinatorConfig, DispatchReport, SessionCoordinator, SessionPhase, effective_permission_mode,
};
pub use error::CoordinatorError;
pub use gateway::Gateway;
pub use registry::{SessionRecord, SessionRegistry};
pub use replay::ReplayBackend;
pub use translate::{Translation, translate};
pub use transport::{LineSink, SignalSink, emit};
